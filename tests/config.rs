// Copyright 2024 FastLabs Developers
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::path::PathBuf;

use filesink::FileSinkConfig;
use filesink::Level;

#[test]
fn test_deserialize_partial_config() {
    let config: FileSinkConfig = serde_json::from_str(
        r#"{
            "path": "var/log/service.log",
            "min_level": "warning",
            "retention_days": 14
        }"#,
    )
    .unwrap();

    assert_eq!(
        config,
        FileSinkConfig {
            path: PathBuf::from("var/log/service.log"),
            min_level: Level::Warning,
            retention_days: Some(14),
            ..FileSinkConfig::default()
        }
    );
    assert_eq!(config.max_file_size_bytes, 5 * 1024 * 1024);
}

#[test]
fn test_deserialize_empty_config_gives_defaults() {
    let config: FileSinkConfig = serde_json::from_str("{}").unwrap();
    assert_eq!(config, FileSinkConfig::default());
}

#[test]
fn test_deserialize_negative_size_and_short_level() {
    let config: FileSinkConfig =
        serde_json::from_str(r#"{ "max_file_size_bytes": -1, "min_level": "info" }"#).unwrap();
    assert_eq!(config.max_file_size_bytes, -1);
    assert_eq!(config.min_level, Level::Information);
}

#[test]
fn test_deserialize_rejects_unknown_level() {
    let result = serde_json::from_str::<FileSinkConfig>(r#"{ "min_level": "loud" }"#);
    assert!(result.is_err());
}
