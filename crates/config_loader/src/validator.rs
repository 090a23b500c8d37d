//! Configuration validation.
//!
//! Rules:
//! - stream names unique and non-empty
//! - main_stream refers to a declared stream
//! - event streams carry positive pixel dimensions
//! - shard_capacity >= 1
//! - patch_diameter even and within (0, 16)
//! - rate_hz > 0 when given

use std::collections::HashSet;

use contracts::{PipelineBlueprint, PipelineError, StreamKind};

/// Validate a PipelineBlueprint.
///
/// Returns the first error encountered, or Ok(()).
pub fn validate(blueprint: &PipelineBlueprint) -> Result<(), PipelineError> {
    validate_streams(blueprint)?;
    validate_slicer(blueprint)?;
    validate_store(blueprint)?;
    validate_surface(blueprint)?;
    Ok(())
}

fn validate_streams(blueprint: &PipelineBlueprint) -> Result<(), PipelineError> {
    if blueprint.streams.is_empty() {
        return Err(PipelineError::config_validation(
            "streams",
            "at least one stream must be declared",
        ));
    }

    let mut seen = HashSet::new();
    for stream in &blueprint.streams {
        if stream.name.is_empty() {
            return Err(PipelineError::config_validation(
                "streams[].name",
                "stream name cannot be empty",
            ));
        }

        if !seen.insert(&stream.name) {
            return Err(PipelineError::config_validation(
                format!("streams[name={}]", stream.name),
                "duplicate stream name",
            ));
        }

        if stream.kind == StreamKind::Events {
            match (stream.width, stream.height) {
                (Some(w), Some(h)) if w > 0 && h > 0 => {}
                _ => {
                    return Err(PipelineError::config_validation(
                        format!("streams[name={}]", stream.name),
                        "event streams require positive width and height",
                    ));
                }
            }
        }

        if let Some(rate) = stream.rate_hz {
            if rate <= 0.0 {
                return Err(PipelineError::config_validation(
                    format!("streams[name={}].rate_hz", stream.name),
                    format!("rate_hz must be > 0, got {rate}"),
                ));
            }
        }
    }

    Ok(())
}

fn validate_slicer(blueprint: &PipelineBlueprint) -> Result<(), PipelineError> {
    let main = &blueprint.slicer.main_stream;
    if blueprint.stream(main).is_none() {
        return Err(PipelineError::config_validation(
            "slicer.main_stream",
            format!("main_stream '{main}' not found among declared streams"),
        ));
    }
    Ok(())
}

fn validate_store(blueprint: &PipelineBlueprint) -> Result<(), PipelineError> {
    if blueprint.store.shard_capacity == 0 {
        return Err(PipelineError::config_validation(
            "store.shard_capacity",
            "shard_capacity must be at least 1",
        ));
    }

    if let Some(retain) = blueprint.store.retain_duration_us {
        if retain <= 0 {
            return Err(PipelineError::config_validation(
                "store.retain_duration_us",
                format!("retain_duration_us must be > 0, got {retain}"),
            ));
        }
    }

    Ok(())
}

fn validate_surface(blueprint: &PipelineBlueprint) -> Result<(), PipelineError> {
    let diameter = blueprint.surface.patch_diameter;
    if diameter == 0 || diameter >= 16 || diameter % 2 != 0 {
        return Err(PipelineError::config_validation(
            "surface.patch_diameter",
            format!("patch_diameter must be even and within (0, 16), got {diameter}"),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use contracts::{ConfigVersion, SlicerConfig, StoreConfig, StreamConfig, SurfaceConfig};

    use super::*;

    fn minimal_blueprint() -> PipelineBlueprint {
        PipelineBlueprint {
            version: ConfigVersion::V1,
            streams: vec![
                StreamConfig {
                    name: "events".into(),
                    kind: StreamKind::Events,
                    width: Some(640),
                    height: Some(480),
                    rate_hz: None,
                },
                StreamConfig {
                    name: "frames".into(),
                    kind: StreamKind::Frames,
                    width: None,
                    height: None,
                    rate_hz: Some(25.0),
                },
            ],
            store: StoreConfig::default(),
            surface: SurfaceConfig::default(),
            slicer: SlicerConfig {
                main_stream: "events".into(),
                min_retained_records: 0,
            },
        }
    }

    #[test]
    fn test_valid_config() {
        let bp = minimal_blueprint();
        assert!(validate(&bp).is_ok());
    }

    #[test]
    fn test_duplicate_stream_name() {
        let mut bp = minimal_blueprint();
        bp.streams.push(bp.streams[0].clone());
        let result = validate(&bp);
        assert!(result.is_err());
        let err = result.unwrap_err().to_string();
        assert!(err.contains("duplicate stream name"), "got: {err}");
    }

    #[test]
    fn test_event_stream_requires_dimensions() {
        let mut bp = minimal_blueprint();
        bp.streams[0].width = None;
        let result = validate(&bp);
        assert!(result.is_err());
        let err = result.unwrap_err().to_string();
        assert!(err.contains("width and height"), "got: {err}");
    }

    #[test]
    fn test_invalid_rate() {
        let mut bp = minimal_blueprint();
        bp.streams[1].rate_hz = Some(-5.0);
        let result = validate(&bp);
        assert!(result.is_err());
        let err = result.unwrap_err().to_string();
        assert!(err.contains("rate_hz must be > 0"), "got: {err}");
    }

    #[test]
    fn test_main_stream_not_found() {
        let mut bp = minimal_blueprint();
        bp.slicer.main_stream = "nonexistent".into();
        let result = validate(&bp);
        assert!(result.is_err());
        let err = result.unwrap_err().to_string();
        assert!(err.contains("not found"), "got: {err}");
    }

    #[test]
    fn test_zero_shard_capacity() {
        let mut bp = minimal_blueprint();
        bp.store.shard_capacity = 0;
        let result = validate(&bp);
        assert!(result.is_err());
        let err = result.unwrap_err().to_string();
        assert!(err.contains("shard_capacity"), "got: {err}");
    }

    #[test]
    fn test_invalid_patch_diameter() {
        for diameter in [0, 3, 16, 17] {
            let mut bp = minimal_blueprint();
            bp.surface.patch_diameter = diameter;
            let result = validate(&bp);
            assert!(result.is_err(), "diameter {diameter} should fail");
        }
    }

    #[test]
    fn test_empty_stream_list() {
        let mut bp = minimal_blueprint();
        bp.streams.clear();
        assert!(validate(&bp).is_err());
    }
}
