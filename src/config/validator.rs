//! Configuration validation

use super::*;
use anyhow::Result;

/// Validate complete report context
pub fn validate_context(ctx: &ReportContext) -> Result<()> {
    validate_device(&ctx.device)?;
    validate_paths(&ctx.paths)?;
    validate_timeseries(&ctx.timeseries)?;
    validate_exceedance(&ctx.exceedance)?;
    Ok(())
}

/// Validate device identity
pub fn validate_device(device: &DeviceInfo) -> Result<()> {
    if device.drive.trim().is_empty() {
        anyhow::bail!("device.drive must not be empty");
    }

    if device.avail_capacity_gib > 0 && device.tested_capacity_gib > device.avail_capacity_gib {
        anyhow::bail!(
            "tested_capacity_gib ({}) exceeds avail_capacity_gib ({})",
            device.tested_capacity_gib,
            device.avail_capacity_gib
        );
    }

    if device.cores == 0 {
        anyhow::bail!("device.cores must be at least 1");
    }

    Ok(())
}

/// Validate artifact locations
pub fn validate_paths(paths: &PathsConfig) -> Result<()> {
    if paths.details_dir.as_os_str().is_empty() {
        anyhow::bail!("paths.details_dir must not be empty");
    }

    if let Some(ref tag) = paths.tag {
        validate_file_component("paths.tag", tag)?;
    }

    Ok(())
}

/// Validate time series windowing
pub fn validate_timeseries(ts: &TimeseriesConfig) -> Result<()> {
    if ts.runtime_secs == 0 {
        anyhow::bail!("timeseries.runtime_secs must be at least 1");
    }

    // One slot per second is held in memory per thread
    let window = ts.runtime_secs.saturating_add(ts.padding_secs);
    if window > 7 * 24 * 3600 {
        anyhow::bail!("timeseries window of {}s is longer than a week", window);
    }

    Ok(())
}

/// Validate the exceedance comparison layout
pub fn validate_exceedance(layout: &ExceedanceLayout) -> Result<()> {
    if layout.write_pct > 100 {
        anyhow::bail!("exceedance.write_pct must be between 0 and 100, got {}", layout.write_pct);
    }

    if layout.block_size == 0 {
        anyhow::bail!("exceedance.block_size must be greater than 0");
    }

    if layout.iodepth == 0 {
        anyhow::bail!("exceedance.iodepth must be at least 1");
    }

    if layout.threads.is_empty() {
        anyhow::bail!("exceedance.threads must list at least one thread count");
    }

    if let Some(zero) = layout.threads.iter().position(|&t| t == 0) {
        anyhow::bail!("exceedance.threads[{}] must be at least 1", zero);
    }

    validate_file_component("exceedance.suffix", &layout.suffix)?;

    Ok(())
}

fn validate_file_component(field: &str, value: &str) -> Result<()> {
    if value.is_empty() {
        anyhow::bail!("{} must not be empty", field);
    }
    if value.contains('/') || value.contains('\\') {
        anyhow::bail!("{} must not contain path separators: {}", field, value);
    }
    Ok(())
}
