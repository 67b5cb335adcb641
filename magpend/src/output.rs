use std::{
    fs::{self, File},
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};

use csv::Writer;
use magpend_diffeq::saving::History;
use tracing::info;

use crate::{ConfigErrors, model::PendulumParams};

/// Writes the cartesian bob track as `t,x,y,energy`.
pub fn write_bob_csv<W: Write>(
    writer: W,
    history: &History,
    params: &PendulumParams,
) -> Result<(), ConfigErrors> {
    let mut writer = Writer::from_writer(writer);
    writer.write_record(["t", "x", "y", "energy"])?;

    for (t, x) in history.times().zip(history) {
        let (bob_x, bob_y) = params.bob_position(x.get("theta")?);
        writer.write_record(&[
            t.to_string(),
            bob_x.to_string(),
            bob_y.to_string(),
            params.energy(x)?.to_string(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

/// Creates `dir` if needed and writes `state.csv` and `bob.csv` into it.
/// Returns the paths written.
pub fn write_outputs(
    dir: &Path,
    history: &History,
    params: &PendulumParams,
) -> Result<Vec<PathBuf>, ConfigErrors> {
    fs::create_dir_all(dir)?;

    let state_path = dir.join("state.csv");
    history.save(&state_path)?;

    let bob_path = dir.join("bob.csv");
    write_bob_csv(BufWriter::new(File::create(&bob_path)?), history, params)?;

    info!(dir = %dir.display(), "results written");
    Ok(vec![state_path, bob_path])
}

#[cfg(test)]
mod tests {
    use super::*;
    use magpend_diffeq::state::NamedState;

    use crate::config::SimConfig;

    fn short_run() -> (History, PendulumParams) {
        let config = SimConfig {
            steps: 3,
            ..SimConfig::default()
        };
        (config.run(false).unwrap(), config.pendulum_params().unwrap())
    }

    #[test]
    fn test_bob_csv() {
        let (history, params) = short_run();
        let mut buffer = Vec::new();
        write_bob_csv(&mut buffer, &history, &params).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        let lines: Vec<_> = text.lines().collect();

        assert_eq!(lines.len(), 5);
        assert_eq!(lines[0], "t,x,y,energy");
        let first: Vec<f64> = lines[1]
            .split(',')
            .map(|v| v.parse().unwrap())
            .collect();
        let (x, y) = params.bob_position(-1.5);
        assert_eq!(first[0], 0.0);
        assert_eq!(first[1], x);
        assert_eq!(first[2], y);
        assert_eq!(first[3], params.energy(&history[0]).unwrap());
    }

    #[test]
    fn test_bob_csv_needs_theta() {
        let x0 = NamedState::new([("phi", 0.0), ("w", 0.0)]).unwrap();
        let history = magpend_diffeq::integrate(
            &magpend_diffeq::tableau::ButcherTableau::euler(),
            &|x: &NamedState, _: &()| -> magpend_diffeq::ModelResult { Ok(x.zeros_like()) },
            &x0,
            &(),
            0.1,
            1,
        )
        .unwrap();
        let result = write_bob_csv(Vec::new(), &history, &PendulumParams::default());
        assert!(matches!(result, Err(ConfigErrors::Diffeq(_))));
    }

    #[test]
    fn test_write_outputs() {
        let (history, params) = short_run();
        let dir = std::env::temp_dir()
            .join(format!("magpend_output_{}", std::process::id()))
            .join("results");
        let written = write_outputs(&dir, &history, &params).unwrap();
        assert_eq!(written, vec![dir.join("state.csv"), dir.join("bob.csv")]);

        let state = fs::read_to_string(dir.join("state.csv")).unwrap();
        assert!(state.starts_with("t,theta,w"));
        assert_eq!(state.lines().count(), 5);
        let bob = fs::read_to_string(dir.join("bob.csv")).unwrap();
        assert_eq!(bob.lines().count(), 5);

        if let Some(parent) = dir.parent() {
            fs::remove_dir_all(parent).unwrap();
        }
    }
}
