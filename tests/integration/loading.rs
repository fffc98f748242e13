//! Format registry tests

use crate::helpers::{FakeFormat, TEST_BUFFER_SIZE, TEST_SAMPLE_RATE};
use minihost::{Error, FormatRegistry, OpenOptions, PluginChain};
use minihost_core::Error as CoreError;
use std::path::{Path, PathBuf};

fn touch(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, b"").unwrap();
    path
}

#[test]
fn test_opened_plugins_chain_together() -> minihost::Result<()> {
    let dir = tempfile::tempdir().unwrap();
    let synth = touch(dir.path(), "synth.fake");
    let fx = touch(dir.path(), "fx.fake");

    let registry = FormatRegistry::new().with_format(FakeFormat);
    let options = OpenOptions::new(TEST_SAMPLE_RATE, TEST_BUFFER_SIZE);

    let chain = PluginChain::<f32>::builder()
        .stage(registry.open(&synth, &options.clone().channels(0, 2))?)
        .stage(registry.open(&fx, &options)?)
        .build::<f32>()?;

    assert_eq!(chain.num_stages(), 2);
    assert_eq!(chain.input_channels(), 0);
    assert_eq!(chain.output_channels(), 2);
    assert_eq!(chain.sample_rate(), TEST_SAMPLE_RATE);
    Ok(())
}

#[test]
fn test_mixed_sample_rates_rejected_at_build() {
    let dir = tempfile::tempdir().unwrap();
    let path = touch(dir.path(), "a.fake");
    let registry = FormatRegistry::new().with_format(FakeFormat);

    let first = registry
        .open(&path, &OpenOptions::new(48_000.0, 512))
        .unwrap();
    let second = registry
        .open(&path, &OpenOptions::new(44_100.0, 512))
        .unwrap();

    let result = PluginChain::<f32>::builder()
        .stage(first)
        .stage(second)
        .build::<f32>();
    assert!(matches!(
        result,
        Err(CoreError::SampleRateMismatch { stage: 1, .. })
    ));
}

#[test]
fn test_unknown_extension_is_not_opened() {
    let dir = tempfile::tempdir().unwrap();
    let path = touch(dir.path(), "plugin.vst3");
    let registry = FormatRegistry::new().with_format(FakeFormat);

    let err: Error = registry
        .open(&path, &OpenOptions::default())
        .err()
        .unwrap()
        .into();
    assert!(matches!(err, Error::Core(CoreError::UnknownFormat(_))));
}

#[test]
fn test_scan_lists_only_recognized_plugins() {
    let dir = tempfile::tempdir().unwrap();
    touch(dir.path(), "b.fake");
    touch(dir.path(), "a.fake");
    touch(dir.path(), "readme.md");

    let registry = FormatRegistry::new().with_format(FakeFormat);
    let found = registry.scan_directory(dir.path()).unwrap();
    assert_eq!(found.len(), 2);
    assert!(found[0].ends_with("a.fake"));
}
