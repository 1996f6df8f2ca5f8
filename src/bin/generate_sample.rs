use anyhow::{Context, Result};
use serde_json::json;

/// Minimal deterministic PRNG (xoshiro256**)
struct SimpleRng {
    state: [u64; 4],
}

impl SimpleRng {
    fn new(seed: u64) -> Self {
        let mut s = [0u64; 4];
        let mut x = seed;
        for slot in &mut s {
            x = x.wrapping_mul(6364136223846793005).wrapping_add(1);
            *slot = x;
        }
        SimpleRng { state: s }
    }

    fn next_u64(&mut self) -> u64 {
        let result = (self.state[1].wrapping_mul(5))
            .rotate_left(7)
            .wrapping_mul(9);
        let t = self.state[1] << 17;
        self.state[2] ^= self.state[0];
        self.state[3] ^= self.state[1];
        self.state[1] ^= self.state[2];
        self.state[0] ^= self.state[3];
        self.state[2] ^= t;
        self.state[3] = self.state[3].rotate_left(45);
        result
    }

    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Box-Muller transform for normal distribution
    fn gauss(&mut self, mean: f64, std_dev: f64) -> f64 {
        let u1 = self.next_f64().max(1e-15);
        let u2 = self.next_f64();
        let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
        mean + std_dev * z
    }
}

const HEADER: [&str; 15] = [
    "SN",
    "Config",
    "W_L (cd/m2)",
    "W_U (%)",
    "W_dY",
    "W_Max Deviation (%)",
    "W_u'",
    "W_v'",
    "W_M2_Flicker",
    "M_L (cd/m2)",
    "M_U (%)",
    "M_dY",
    "M_u'",
    "M_v'",
    "Result",
];

fn main() -> Result<()> {
    let mut rng = SimpleRng::new(42);
    let configs = ["EVT", "DVT", "PVT"];

    let log_path = "sample_testlog.csv";
    let mut writer = csv::Writer::from_path(log_path).context("creating sample log")?;
    writer.write_record(HEADER)?;

    let mut rows = 0usize;
    for (c, config) in configs.iter().enumerate() {
        // later builds are tighter
        let spread = 1.0 / (c as f64 + 1.0);
        for unit in 0..40 {
            let station_fail = rng.next_f64() < 0.02;
            let record = vec![
                format!("{config}-{unit:04}"),
                config.to_string(),
                format!("{:.2}", rng.gauss(420.0, 25.0 * spread)),
                format!("{:.2}", rng.gauss(86.0, 3.0 * spread)),
                format!("{:.4}", rng.gauss(1.5, 1.2 * spread)),
                format!("{:.3}", rng.gauss(6.0, 2.5 * spread).abs()),
                format!("{:.5}", rng.gauss(0.1960, 0.004 * spread)),
                format!("{:.5}", rng.gauss(0.4660, 0.004 * spread)),
                format!("{:.3}", rng.gauss(2.0, 0.6 * spread).abs()),
                format!("{:.2}", rng.gauss(380.0, 25.0 * spread)),
                format!("{:.2}", rng.gauss(84.0, 3.0 * spread)),
                format!("{:.4}", rng.gauss(0.0, 1.5 * spread)),
                format!("{:.5}", rng.gauss(0.1955, 0.004 * spread)),
                format!("{:.5}", rng.gauss(0.4655, 0.004 * spread)),
                if station_fail { "FAIL" } else { "PASS" }.to_string(),
            ];
            writer.write_record(&record)?;
            rows += 1;
        }
    }
    writer.flush()?;

    let specs = json!({
        "White": {
            "W_Lightness": [380, ""],
            "Uniformity": [80, "0"],
            "dY": [-1, 3.5],
            "Max Deviation": ["-1", 10],
            "Metric2": [0, 3]
        },
        "Mixed": {
            "Lightness": [340, ""],
            "U": [78, "0"],
            "dY": [-3, 3]
        }
    });
    let spec_path = "sample_specs.json";
    std::fs::write(spec_path, serde_json::to_string_pretty(&specs)?)
        .context("writing sample specs")?;

    // Mixed gets a supplied polygon; White falls back to the default region.
    let polygons = json!({
        "Mixed": [[0.188, 0.458], [0.203, 0.458], [0.203, 0.473], [0.188, 0.473]]
    });
    let polygon_path = "sample_polygons.json";
    std::fs::write(polygon_path, serde_json::to_string_pretty(&polygons)?)
        .context("writing sample polygons")?;

    println!("Wrote {rows} records to {log_path}, specs to {spec_path}, polygons to {polygon_path}");
    Ok(())
}
