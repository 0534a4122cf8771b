use crate::error::VcfResult;
use log;
use std::{fmt::Display, sync::Once};

pub type Result<T> = VcfResult<T>;

#[allow(unused)]
static INIT_LOG: Once = Once::new();

#[allow(unused)]
pub fn init_logger() {
    INIT_LOG.call_once(|| {
        env_logger::builder()
            .filter_level(log::LevelFilter::Trace)
            .is_test(true)
            .init();
    });
}

pub fn handle_error_and_exit(err: impl Display) -> ! {
    log::error!("{err}");
    std::process::exit(1);
}

pub fn log_warning<T>(err: impl Display, default: T) -> T {
    log::warn!("{err}");
    default
}

/// Parses a `VCFvX.Y` file format string into its numeric version.
pub fn parse_fileformat_version(value: &str) -> Option<(u32, u32)> {
    let version = value.strip_prefix("VCFv")?;
    let (major, minor) = version.split_once('.')?;
    Some((major.parse().ok()?, minor.parse().ok()?))
}

/// Number of unordered genotypes for `ploidy` draws from `n_alleles` alleles,
/// i.e. `C(n_alleles + ploidy - 1, ploidy)`. `None` when it does not fit a `usize`.
pub fn genotype_count(n_alleles: usize, ploidy: usize) -> Option<usize> {
    if n_alleles == 0 {
        return Some(0);
    }
    let mut count: usize = 1;
    for i in 1..=ploidy {
        count = count.checked_mul(n_alleles.checked_add(i - 1)?)? / i;
    }
    Some(count)
}
