//! Block-device probe output parsing.
//!
//! The probe emits one line per recognized device:
//!
//! ```text
//! /dev/sr0: LABEL="MY_DVD" UUID="1234-5678"
//! ```
//!
//! Values are always double-quoted and may contain spaces; keys are `\w+`.
//! Empty probe output is a valid, expected outcome (no recognizable
//! filesystem on the disc) and parses to an empty map.

use regex_lite::Regex;
use std::collections::BTreeMap;

/// `KEY -> value` attributes reported for a single device.
pub type DeviceParams = BTreeMap<String, String>;

/// Parse the probe's per-device attribute list.
pub fn parse_blkid_params(params_str: &str) -> DeviceParams {
    let re = Regex::new(r#"(\w+)="([^"]+)""#).unwrap();
    let mut params = BTreeMap::new();
    for caps in re.captures_iter(params_str) {
        params.insert(caps[1].to_string(), caps[2].to_string());
    }
    params
}

/// Parse full probe output into a `device -> params` map.
pub fn parse_blkid(blkid_str: &str) -> BTreeMap<String, DeviceParams> {
    let mut blkid = BTreeMap::new();
    for line in blkid_str.lines() {
        if line.is_empty() {
            continue;
        }
        let Some((device, params_str)) = line.split_once(": ") else {
            continue;
        };
        blkid.insert(device.to_string(), parse_blkid_params(params_str));
    }
    blkid
}
