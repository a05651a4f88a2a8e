pub mod evaluate;
pub mod sample;

#[cfg(test)]
pub(crate) mod fixtures {
    use rigid_flows::core::models::water_model::{reference_geometry, tip4p_ew};
    use std::fs;
    use std::path::{Path, PathBuf};

    /// Writes a two-molecule TIP4P/Ew model next to a run file that points at it and returns
    /// the run file path.
    pub fn write_run_files(dir: &Path) -> PathBuf {
        let (_, rule) = tip4p_ew();
        let positions: Vec<String> = [0.0, 0.3]
            .into_iter()
            .flat_map(|x| {
                let [o, h1, h2] = reference_geometry([x, 0.0, 0.0].into());
                let m = o * rule.weights[0] + h1 * rule.weights[1] + h2 * rule.weights[2];
                [o, h1, h2, m]
            })
            .map(|p| format!("[{}, {}, {}]", p.x, p.y, p.z))
            .collect();
        let model = format!(
            r#"{{
                "n_molecules": 2,
                "sites": [
                    {{"name": "O", "charge": 0.0, "sigma": 0.316435, "epsilon": 0.680946}},
                    {{"name": "H1", "charge": 0.52422}},
                    {{"name": "H2", "charge": 0.52422}},
                    {{"name": "M", "charge": -1.04844}}
                ],
                "virtual_site": {{"site": 3, "parents": [0, 1, 2], "weights": [0.786646558, 0.106676721, 0.106676721]}},
                "box": [[3.0, 0.0, 0.0], [0.0, 3.0, 0.0], [0.0, 0.0, 3.0]],
                "positions": [{}]
            }}"#,
            positions.join(", ")
        );
        fs::write(dir.join("model-Ih_T250_N2.json"), model).unwrap();

        let run_file = dir.join("run.toml");
        fs::write(
            &run_file,
            r#"
auxiliary-shape = 3

[system]
path = "."
ice-type = "Ih"
num-molecules = 2
temperature = 250.0

[base]
rot-concentration = 5.0
"#,
        )
        .unwrap();
        run_file
    }
}
