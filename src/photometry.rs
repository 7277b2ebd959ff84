//! Quick photometry of on-target products and the session's running
//! zero-points.

use async_trait::async_trait;
use serde::Deserialize;
use std::path::Path;
use tracing::{info, warn};

use crate::config::CommandsConfig;
use crate::error::{Error, Result};
use crate::fits::HeaderSource;
use crate::products::ReducedProduct;
use crate::subprocess::{ProcessCommandBuilder, ProcessError, SubprocessManager};

/// Filters that carry a running zero-point.
pub const FILTERS: [&str; 4] = ["u", "g", "r", "i"];

#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
pub struct PhotometryResult {
    pub mag: Option<f64>,
    pub mag_err: Option<f64>,
    pub zeropoint: Option<f64>,
}

#[async_trait]
pub trait Photometer: Send + Sync {
    async fn quick_photometry(
        &self,
        path: &Path,
        zeropoint: Option<f64>,
    ) -> Result<PhotometryResult>;
}

/// Photometer backed by a command printing one JSON object
/// `{"mag": .., "mag_err": .., "zeropoint": ..}` on stdout.
pub struct CommandPhotometer {
    subprocess: SubprocessManager,
    commands: CommandsConfig,
}

impl CommandPhotometer {
    pub fn new(subprocess: SubprocessManager, commands: CommandsConfig) -> Self {
        Self {
            subprocess,
            commands,
        }
    }
}

#[async_trait]
impl Photometer for CommandPhotometer {
    async fn quick_photometry(
        &self,
        path: &Path,
        zeropoint: Option<f64>,
    ) -> Result<PhotometryResult> {
        let mut builder = ProcessCommandBuilder::from_argv(&self.commands.photometry)
            .ok_or(ProcessError::NotConfigured("photometry"))?
            .timeout(self.commands.timeout);
        if let Some(zp) = zeropoint {
            builder = builder.args(["--zeropoint".to_string(), format!("{zp}")]);
        }
        let output = self
            .subprocess
            .run_checked(builder.path_arg(path).build())
            .await?;
        parse_result(&output.stdout)
    }
}

fn parse_result(stdout: &str) -> Result<PhotometryResult> {
    let line = stdout
        .lines()
        .rev()
        .find(|l| !l.trim().is_empty())
        .ok_or_else(|| Error::Decode("photometry produced no output".into()))?;
    serde_json::from_str(line.trim())
        .map_err(|e| Error::Decode(format!("photometry output {line:?}: {e}")))
}

/// Per-filter zero-points. Each filter is set at most once per session:
/// the first measurement wins and later ones are ignored.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ZeroPoints {
    values: [Option<f64>; 4],
}

impl ZeroPoints {
    pub fn new() -> Self {
        Self::default()
    }

    fn index(filter: &str) -> Option<usize> {
        FILTERS.iter().position(|f| *f == filter)
    }

    pub fn get(&self, filter: &str) -> Option<f64> {
        Self::index(filter).and_then(|i| self.values[i])
    }

    /// Adopt `value` for `filter` if none is set yet. Returns whether it
    /// was adopted.
    pub fn adopt(&mut self, filter: &str, value: f64) -> bool {
        match Self::index(filter) {
            Some(i) if self.values[i].is_none() => {
                self.values[i] = Some(value);
                true
            }
            _ => false,
        }
    }
}

/// Quick photometry for one product, updating `zero_points`. Skips
/// products that are not on target; every failure is logged only.
pub async fn measure_product(
    product: &ReducedProduct,
    headers: &dyn HeaderSource,
    photometer: &dyn Photometer,
    zero_points: &mut ZeroPoints,
) -> Option<PhotometryResult> {
    if !product.on_target(headers) {
        return None;
    }
    let (name, filter) = product.target(headers)?;
    info!(
        "Getting quick {}-band mag for {} in {}",
        filter,
        name,
        product.path.display()
    );

    let result = match photometer
        .quick_photometry(&product.path, zero_points.get(&filter))
        .await
    {
        Ok(result) => result,
        Err(e) => {
            warn!("Quick mag failed for {}: {}", product.path.display(), e);
            return None;
        }
    };

    match (result.mag, result.mag_err) {
        (Some(mag), Some(err)) => info!("Quick MAG = {:.3} +- {:.3}", mag, err),
        _ => warn!("Quick mag failed!"),
    }
    if let Some(zp) = result.zeropoint {
        info!("Quick MAG_ZP: {:.3}", zp);
        if zero_points.adopt(&filter, zp) {
            info!("Adopted {}-band zero-point {:.3}", filter, zp);
        }
    }
    Some(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fits::HeaderValue;
    use crate::testing::mocks::{FlakyHeaders, MockPhotometer};

    #[test]
    fn test_first_writer_wins() {
        let mut zp = ZeroPoints::new();
        assert!(zp.adopt("r", 25.1));
        assert!(!zp.adopt("r", 24.0));
        assert_eq!(zp.get("r"), Some(25.1));
        assert_eq!(zp.get("g"), None);
        assert!(!zp.adopt("z", 20.0));
        assert_eq!(zp.get("z"), None);
    }

    #[test]
    fn test_parse_result() {
        let r = parse_result("noise\n{\"mag\": 17.2, \"mag_err\": 0.05, \"zeropoint\": 25.3}\n")
            .unwrap();
        assert_eq!(r.mag, Some(17.2));
        assert_eq!(r.zeropoint, Some(25.3));

        let partial = parse_result("{\"mag\": null, \"mag_err\": null}").unwrap();
        assert_eq!(partial, PhotometryResult::default());

        assert!(matches!(parse_result(""), Err(Error::Decode(_))));
        assert!(matches!(parse_result("oops"), Err(Error::Decode(_))));
    }

    fn on_target(headers: &FlakyHeaders, path: &Path, object: &str) {
        headers.set(
            path,
            &[
                ("OBJECT", HeaderValue::String(object.into())),
                ("ONTARGET", HeaderValue::Logical(true)),
            ],
        );
    }

    #[tokio::test]
    async fn test_zero_point_is_supplied_after_first_standard() {
        let headers = FlakyHeaders::new();
        let std1 = ReducedProduct::new("/d/reduced/rc1_STD-hz44_r_r.fits");
        let std2 = ReducedProduct::new("/d/reduced/rc2_STD-bd28_r_r.fits");
        let sci = ReducedProduct::new("/d/reduced/rc3_ZTF24_r_r.fits");
        on_target(&headers, &std1.path, "STD-hz44 r");
        on_target(&headers, &std2.path, "STD-bd28 r");
        on_target(&headers, &sci.path, "ZTF24 r");

        let photometer = MockPhotometer::new();
        photometer.respond(&std1.path, Some(25.0));
        photometer.respond(&std2.path, Some(24.0));
        photometer.respond(&sci.path, None);

        let mut zp = ZeroPoints::new();
        for p in [&std1, &std2, &sci] {
            measure_product(p, &headers, &photometer, &mut zp).await;
        }

        assert_eq!(zp.get("r"), Some(25.0));
        let calls = photometer.calls();
        assert_eq!(calls.len(), 3);
        assert_eq!(calls[0].1, None);
        assert_eq!(calls[1].1, Some(25.0));
        assert_eq!(calls[2].1, Some(25.0));
    }

    #[tokio::test]
    async fn test_off_target_product_is_not_measured() {
        let headers = FlakyHeaders::new();
        let product = ReducedProduct::new("/d/reduced/rc1_ZTF24_g_g.fits");
        headers.set(
            &product.path,
            &[
                ("OBJECT", HeaderValue::String("ZTF24 g".into())),
                ("ONTARGET", HeaderValue::Logical(false)),
            ],
        );
        let photometer = MockPhotometer::new();
        let mut zp = ZeroPoints::new();
        assert!(measure_product(&product, &headers, &photometer, &mut zp)
            .await
            .is_none());
        assert!(photometer.calls().is_empty());
    }

    #[tokio::test]
    async fn test_command_photometer_passes_zero_point() {
        let (subprocess, mock) = SubprocessManager::mock();
        mock.expect_command("rcphot")
            .returns_stdout("{\"mag\": 18.0, \"mag_err\": 0.1, \"zeropoint\": null}\n")
            .finish();
        let photometer = CommandPhotometer::new(subprocess, CommandsConfig::default());
        let result = photometer
            .quick_photometry(Path::new("/d/reduced/rc1_x_r_r.fits"), Some(25.5))
            .await
            .unwrap();
        assert_eq!(result.mag, Some(18.0));
        assert_eq!(
            mock.get_call_history()[0].args,
            ["--zeropoint", "25.5", "/d/reduced/rc1_x_r_r.fits"]
        );
    }
}
