#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    // Arbitrary TOML must be rejected gracefully: parse errors, validation
    // errors and stage conversion errors are fine, panics are not.
    let Ok(cfg) = stage_config::load_toml(data) else {
        return;
    };
    if cfg.validate().is_err() {
        return;
    }
    for name in cfg.stages.keys() {
        let _ = stage_core::conversions::stage_config(&cfg, name);
    }
});
