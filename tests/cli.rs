use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use serde_json::json;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn ek60_acquisition(raw_name: &str) -> serde_json::Value {
    json!({
        "attrs": {"keywords": "EK60"},
        "groups": {
            "Sonar": {
                "attrs": {
                    "sonar_model": "EK60",
                    "sonar_software_name": "ER60",
                    "sonar_software_version": "2.4.3"
                }
            },
            "Sonar/Beam_group1": {
                "dims": {"channel": 1, "ping_time": 2, "range_sample": 1002},
                "coords": {
                    "channel": {"dims": ["channel"], "data": ["GPT  38 kHz 009072033fa5 2-1 ES38B"]}
                },
                "data_vars": {
                    "frequency_nominal": {"dims": ["channel"], "data": [38000.0]},
                    "transmit_duration_nominal": {
                        "dims": ["channel", "ping_time"],
                        "data": [[0.001024, 0.001024]]
                    },
                    "sample_interval": {
                        "dims": ["channel", "ping_time"],
                        "data": [[0.000256, 0.000256]]
                    },
                    "transmit_power": {"dims": ["channel", "ping_time"], "data": [[1000.0, 1000.0]]},
                    "beamwidth_twoway_alongship": {"dims": ["channel"], "data": [7.02]},
                    "beamwidth_twoway_athwartship": {"dims": ["channel"], "data": [6.98]}
                }
            },
            "Platform": {
                "coords": {
                    "time1": {
                        "dims": ["time1"],
                        "data": ["2018-07-18T02:03:10", "2018-07-18T02:03:11"]
                    }
                },
                "data_vars": {
                    "sentence_type": {"dims": ["time1"], "data": ["GGA", "GGA"]},
                    "latitude": {"dims": ["time1"], "data": [-54.1, -54.2]},
                    "longitude": {"dims": ["time1"], "data": [-36.1, -36.2]},
                    "water_level": {"dims": [], "data": 5.0}
                }
            },
            "Environment": {
                "data_vars": {
                    "sound_speed_indicative": {"dims": [], "data": 1494.5},
                    "absorption_indicative": {"dims": ["channel"], "data": [0.00977]}
                }
            },
            "Vendor_specific": {
                "data_vars": {
                    "pulse_length": {
                        "dims": ["channel", "pulse_length_bin"],
                        "data": [[0.000256, 0.000512, 0.001024]]
                    },
                    "gain_correction": {
                        "dims": ["channel", "pulse_length_bin"],
                        "data": [[25.0, 25.5, 26.0]]
                    },
                    "sa_correction": {
                        "dims": ["channel", "pulse_length_bin"],
                        "data": [[-0.1, -0.05, 0.0]]
                    }
                }
            },
            "Provenance": {
                "data_vars": {
                    "source_filenames": {"dims": ["filenames"], "data": [raw_name]}
                }
            }
        }
    })
}

fn write_acquisitions(dir: &Path) {
    for stamp in ["D20180718-T020310", "D20180718-T030310"] {
        let doc = ek60_acquisition(&format!("/cruise/raw/{}.raw", stamp));
        fs::write(dir.join(format!("{}.json", stamp)), doc.to_string()).unwrap();
    }
}

#[test]
fn help_lists_survey_options() {
    cargo_bin_cmd!("echometa")
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--cruise"))
        .stdout(predicate::str::contains("--ref-ping"))
        .stdout(predicate::str::contains("--calibration"));
}

#[test]
fn writes_one_row_per_channel() {
    let data = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    write_acquisitions(data.path());

    cargo_bin_cmd!("echometa")
        .current_dir(data.path())
        .arg(data.path())
        .args(["--cruise", "JR16003", "--calibration", "yes", "--output-format", "plain"])
        .arg("-o")
        .arg(out.path())
        .assert()
        .success();

    let table = fs::read_to_string(out.path().join("JR16003_metadata.csv")).unwrap();
    let lines: Vec<&str> = table.lines().collect();
    assert_eq!(lines.len(), 3);
    assert!(lines[0].starts_with("Event,\"Echogram, raw format []\",Identification []//*channel,"));
    assert!(lines[1].starts_with("JR16003,D20180718-T020310.raw,"));
    assert!(lines[2].starts_with("JR16003,D20180718-T030310.raw,"));
    assert!(lines[1].ends_with(",Yes"));
    assert!(out.path().join("JR16003_metadata_report.json").exists());
}

#[test]
fn json_output_reports_files() {
    let data = TempDir::new().unwrap();
    write_acquisitions(data.path());

    let output = cargo_bin_cmd!("echometa")
        .current_dir(data.path())
        .args(["--cruise", "DY090", "--output-format", "json", "-q"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let text = String::from_utf8_lossy(&output);
    let report: serde_json::Value = serde_json::from_str(text.trim()).unwrap();
    assert_eq!(report["cruise_label"], "DY090");
    assert_eq!(report["summary"]["rows_written"], 2);
    assert_eq!(report["files"][0]["dialect"], "EK60");
}

#[test]
fn dry_run_writes_nothing() {
    let data = TempDir::new().unwrap();
    write_acquisitions(data.path());

    cargo_bin_cmd!("echometa")
        .current_dir(data.path())
        .args(["--cruise", "JR16003", "--dry-run", "--output-format", "plain"])
        .assert()
        .success()
        .stdout(predicate::str::contains("D20180718-T020310.json"));

    assert!(!data.path().join("JR16003_metadata.csv").exists());
}

#[test]
fn generate_config_writes_sample() {
    let dir = TempDir::new().unwrap();

    cargo_bin_cmd!("echometa")
        .current_dir(dir.path())
        .arg("--generate-config")
        .assert()
        .success()
        .stdout(predicate::str::contains("echometa.toml"));

    let content = fs::read_to_string(dir.path().join("echometa.toml")).unwrap();
    assert!(content.contains("[survey]"));
}

#[test]
fn empty_directory_exits_with_no_input() {
    let dir = TempDir::new().unwrap();

    cargo_bin_cmd!("echometa")
        .current_dir(dir.path())
        .args(["--cruise", "JR16003", "--output-format", "plain"])
        .assert()
        .code(3);
}

#[test]
fn existing_table_needs_force() {
    let data = TempDir::new().unwrap();
    write_acquisitions(data.path());
    fs::write(data.path().join("JR16003_metadata.csv"), "previous").unwrap();

    cargo_bin_cmd!("echometa")
        .current_dir(data.path())
        .args(["--cruise", "JR16003", "--output-format", "plain"])
        .assert()
        .code(6);
    assert_eq!(
        fs::read_to_string(data.path().join("JR16003_metadata.csv")).unwrap(),
        "previous"
    );

    cargo_bin_cmd!("echometa")
        .current_dir(data.path())
        .args(["--cruise", "JR16003", "--output-format", "plain", "--force"])
        .assert()
        .success();
    let table = fs::read_to_string(data.path().join("JR16003_metadata.csv")).unwrap();
    assert!(table.starts_with("Event,"));
}

#[test]
fn unreadable_file_exits_with_unsupported_dialect() {
    let data = TempDir::new().unwrap();
    let mut doc = ek60_acquisition("/cruise/raw/D20180718-T020310.raw");
    doc["groups"]["Sonar"]["attrs"]["sonar_model"] = json!("ES70");
    doc["attrs"]["keywords"] = json!("ES70");
    fs::write(data.path().join("D20180718-T020310.json"), doc.to_string()).unwrap();

    cargo_bin_cmd!("echometa")
        .current_dir(data.path())
        .args(["--cruise", "JR16003", "--output-format", "plain"])
        .assert()
        .code(4);
    assert!(!data.path().join("JR16003_metadata.csv").exists());
}

#[test]
fn unparsable_file_exits_as_unreadable() {
    let data = TempDir::new().unwrap();
    fs::write(data.path().join("D20180718-T020310.json"), "{ not json").unwrap();

    cargo_bin_cmd!("echometa")
        .current_dir(data.path())
        .args(["--cruise", "JR16003", "--output-format", "plain"])
        .assert()
        .code(4);
    assert!(!data.path().join("JR16003_metadata.csv").exists());
}

#[test]
fn file_without_navigation_exits_with_navigation_missing() {
    let data = TempDir::new().unwrap();
    let mut doc = ek60_acquisition("/cruise/raw/D20180718-T020310.raw");
    doc["groups"].as_object_mut().unwrap().remove("Platform");
    fs::write(data.path().join("D20180718-T020310.json"), doc.to_string()).unwrap();

    cargo_bin_cmd!("echometa")
        .current_dir(data.path())
        .args(["--cruise", "JR16003", "--output-format", "plain"])
        .assert()
        .code(5);
}

#[test]
fn invalid_date_format_is_a_config_error() {
    let data = TempDir::new().unwrap();
    write_acquisitions(data.path());
    fs::write(
        data.path().join("echometa.toml"),
        "[survey]\ncruise_label = \"JR16003\"\ncalibration = \"Yes\"\nreference_ping = 0\n\n\
         [input]\ndata_dir = \".\"\nformat = \"json\"\n\n\
         [output]\ndirectory = \".\"\nfloat_precision = 6\ndate_format = \"%d/%m/%Y %Q\"\n\
         write_report = true\nforce_overwrite = false\n",
    )
    .unwrap();

    cargo_bin_cmd!("echometa")
        .current_dir(data.path())
        .args(["--output-format", "plain"])
        .assert()
        .code(7);
    assert!(!data.path().join("JR16003_metadata.csv").exists());
}
