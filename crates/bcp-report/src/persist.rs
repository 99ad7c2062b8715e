// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use bcp_core::{BcpError, Report};
use bcp_model::PosteriorDraws;
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use std::process;
use std::time::{SystemTime, UNIX_EPOCH};

/// Stable artifact identifier embedded in posterior envelopes.
pub const POSTERIOR_ARTIFACT_ID: &str = "bcp-posterior";
/// Posterior artifact schema version emitted by writers.
pub const CURRENT_POSTERIOR_SCHEMA_VERSION: u32 = 1;
/// Minimum posterior artifact schema version accepted by readers.
pub const MIN_SUPPORTED_POSTERIOR_SCHEMA_VERSION: u32 = 1;

/// Supported codec for the posterior payload bytes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PayloadCodec {
    Json,
    Bincode,
}

/// Versioned, checksummed envelope around serialized posterior draws.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PosteriorEnvelope {
    pub artifact_id: String,
    pub state_schema_version: u32,
    pub engine_fingerprint: String,
    pub created_at_ns: i64,
    pub payload_crc32: u32,
    pub payload_codec: PayloadCodec,
    pub payload: Vec<u8>,
}

impl PosteriorEnvelope {
    fn validate_metadata(&self) -> Result<(), BcpError> {
        if self.artifact_id != POSTERIOR_ARTIFACT_ID {
            return Err(BcpError::invalid_input(format!(
                "posterior artifact_id '{}' is not '{POSTERIOR_ARTIFACT_ID}'",
                self.artifact_id
            )));
        }
        if self.state_schema_version < MIN_SUPPORTED_POSTERIOR_SCHEMA_VERSION
            || self.state_schema_version > CURRENT_POSTERIOR_SCHEMA_VERSION
        {
            return Err(BcpError::invalid_input(format!(
                "posterior schema version {} is outside the supported window [{MIN_SUPPORTED_POSTERIOR_SCHEMA_VERSION}, {CURRENT_POSTERIOR_SCHEMA_VERSION}]",
                self.state_schema_version
            )));
        }
        if self.created_at_ns < 0 {
            return Err(BcpError::invalid_input(format!(
                "posterior created_at_ns must be >= 0; got {}",
                self.created_at_ns
            )));
        }
        Ok(())
    }

    fn verify_payload_crc32(&self) -> Result<(), BcpError> {
        let observed = crc32fast::hash(&self.payload);
        if observed != self.payload_crc32 {
            return Err(BcpError::invalid_input(format!(
                "posterior payload crc32 mismatch: expected=0x{:08x}, observed=0x{observed:08x}",
                self.payload_crc32
            )));
        }
        Ok(())
    }
}

/// Persists posterior draws inside a crc32-checked envelope.
pub fn save_posterior(
    draws: &PosteriorDraws,
    path: &Path,
    codec: PayloadCodec,
) -> Result<(), BcpError> {
    let payload = match codec {
        PayloadCodec::Json => serde_json::to_vec(draws).map_err(|err| {
            BcpError::invalid_input(format!(
                "posterior payload serialization failed (codec=json): {err}"
            ))
        })?,
        PayloadCodec::Bincode => bincode::serialize(draws).map_err(|err| {
            BcpError::invalid_input(format!(
                "posterior payload serialization failed (codec=bincode): {err}"
            ))
        })?,
    };

    let envelope = PosteriorEnvelope {
        artifact_id: POSTERIOR_ARTIFACT_ID.to_string(),
        state_schema_version: CURRENT_POSTERIOR_SCHEMA_VERSION,
        engine_fingerprint: engine_fingerprint(),
        created_at_ns: now_unix_ns()?,
        payload_crc32: crc32fast::hash(&payload),
        payload_codec: codec,
        payload,
    };

    let encoded = serde_json::to_vec(&envelope).map_err(|err| {
        BcpError::invalid_input(format!("posterior envelope serialization failed: {err}"))
    })?;
    write_file_atomic(path, &encoded)
}

/// Loads, verifies, and revalidates a persisted posterior artifact.
pub fn load_posterior(path: &Path) -> Result<PosteriorDraws, BcpError> {
    let encoded = std::fs::read(path)
        .map_err(|err| io_resource_error("failed reading posterior artifact", path, err))?;
    let envelope: PosteriorEnvelope = serde_json::from_slice(&encoded).map_err(|err| {
        BcpError::invalid_input(format!(
            "posterior envelope at '{}' failed to parse: {err}",
            path.display()
        ))
    })?;

    envelope.validate_metadata()?;
    envelope.verify_payload_crc32()?;

    let draws: PosteriorDraws = match envelope.payload_codec {
        PayloadCodec::Json => serde_json::from_slice(&envelope.payload).map_err(|err| {
            BcpError::invalid_input(format!(
                "posterior payload deserialization failed (codec=json): {err}"
            ))
        })?,
        PayloadCodec::Bincode => bincode::deserialize(&envelope.payload).map_err(|err| {
            BcpError::invalid_input(format!(
                "posterior payload deserialization failed (codec=bincode): {err}"
            ))
        })?,
    };
    draws.validate()?;
    Ok(draws)
}

/// Writes the report as pretty JSON, atomically.
pub fn write_report_json(report: &Report, path: &Path) -> Result<(), BcpError> {
    let encoded = serde_json::to_vec_pretty(report)
        .map_err(|err| BcpError::invalid_input(format!("report serialization failed: {err}")))?;
    write_file_atomic(path, &encoded)
}

/// Reads a previously written report back.
pub fn read_report_json(path: &Path) -> Result<Report, BcpError> {
    let encoded = std::fs::read(path)
        .map_err(|err| io_resource_error("failed reading report", path, err))?;
    serde_json::from_slice(&encoded).map_err(|err| {
        BcpError::invalid_input(format!(
            "report at '{}' failed to parse: {err}",
            path.display()
        ))
    })
}

fn engine_fingerprint() -> String {
    format!(
        "bcp-report/{}/{}-{}",
        env!("CARGO_PKG_VERSION"),
        std::env::consts::OS,
        std::env::consts::ARCH
    )
}

fn now_unix_ns() -> Result<i64, BcpError> {
    let elapsed = SystemTime::now().duration_since(UNIX_EPOCH).map_err(|err| {
        BcpError::resource_limit(format!(
            "system clock before UNIX epoch; cannot timestamp artifact: {err}"
        ))
    })?;
    i64::try_from(elapsed.as_nanos()).map_err(|_| {
        BcpError::resource_limit("system timestamp overflow while constructing artifact")
    })
}

fn io_resource_error(action: &str, path: &Path, err: std::io::Error) -> BcpError {
    BcpError::resource_limit(format!("{action} '{}': {err}", path.display()))
}

/// Temp-file-then-rename write so a crash never leaves a torn artifact.
fn write_file_atomic(path: &Path, encoded: &[u8]) -> Result<(), BcpError> {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    let file_name = path.file_name().ok_or_else(|| {
        BcpError::invalid_input(format!(
            "artifact path '{}' must include a file name",
            path.display()
        ))
    })?;
    let file_name = file_name.to_string_lossy();

    let suffix = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_nanos())
        .unwrap_or_default();
    let temp_path = parent.join(format!("{file_name}.tmp-{}-{suffix}", process::id()));

    let mut file = OpenOptions::new()
        .create_new(true)
        .write(true)
        .open(&temp_path)
        .map_err(|err| io_resource_error("failed creating artifact temp file", &temp_path, err))?;

    if let Err(err) = file.write_all(encoded) {
        let _ = std::fs::remove_file(&temp_path);
        return Err(io_resource_error(
            "failed writing artifact temp file",
            &temp_path,
            err,
        ));
    }
    if let Err(err) = file.sync_all() {
        let _ = std::fs::remove_file(&temp_path);
        return Err(io_resource_error(
            "failed syncing artifact temp file",
            &temp_path,
            err,
        ));
    }
    drop(file);

    if let Err(err) = std::fs::rename(&temp_path, path) {
        let _ = std::fs::remove_file(&temp_path);
        return Err(io_resource_error("failed renaming artifact into place", path, err));
    }
    Ok(())
}
