//! Build metadata of the machine the daemon runs on
//!
//! Linux hosts report kernel data from `uname`, the distribution from
//! `/etc/os-release` and the board from `/sys/class/dmi/id`. Values that
//! cannot be read are reported as `unknown`.

use common::BuildInfo;
use std::collections::HashMap;

const UNKNOWN: &str = "unknown";

/// Parse `KEY=value` lines of an os-release file, unquoting values
pub fn parse_os_release(content: &str) -> HashMap<String, String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| line.split_once('='))
        .map(|(key, value)| {
            let value = value.trim();
            let value = value
                .strip_prefix('"')
                .and_then(|v| v.strip_suffix('"'))
                .or_else(|| value.strip_prefix('\'').and_then(|v| v.strip_suffix('\'')))
                .unwrap_or(value);
            (key.trim().to_string(), value.to_string())
        })
        .collect()
}

fn lookup(values: &HashMap<String, String>, keys: &[&str]) -> String {
    keys.iter()
        .find_map(|key| values.get(*key))
        .cloned()
        .unwrap_or_else(|| UNKNOWN.to_string())
}

#[cfg(target_os = "linux")]
pub fn build_info() -> common::Result<BuildInfo> {
    use nix::sys::utsname::uname;

    let uts = uname().map_err(|e| common::Error::Host(format!("uname failed: {}", e)))?;
    let os_release = std::fs::read_to_string("/etc/os-release")
        .or_else(|_| std::fs::read_to_string("/usr/lib/os-release"))
        .map(|content| parse_os_release(&content))
        .unwrap_or_default();

    let dmi = |name: &str| {
        std::fs::read_to_string(format!("/sys/class/dmi/id/{}", name))
            .map(|value| value.trim().to_string())
            .ok()
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| UNKNOWN.to_string())
    };

    Ok(BuildInfo {
        sdk_int: None,
        board: dmi("board_name"),
        bootloader: dmi("bios_version"),
        brand: lookup(&os_release, &["ID"]),
        device: uts.nodename().to_string_lossy().into_owned(),
        display: lookup(&os_release, &["PRETTY_NAME", "NAME"]),
        hardware: uts.machine().to_string_lossy().into_owned(),
        id: lookup(&os_release, &["BUILD_ID", "VERSION_ID"]),
        manufacturer: dmi("sys_vendor"),
        product: dmi("product_name"),
        tags: uts.release().to_string_lossy().into_owned(),
        model: dmi("product_version"),
    })
}

#[cfg(not(target_os = "linux"))]
pub fn build_info() -> common::Result<BuildInfo> {
    Ok(BuildInfo {
        sdk_int: None,
        board: UNKNOWN.to_string(),
        bootloader: UNKNOWN.to_string(),
        brand: std::env::consts::OS.to_string(),
        device: UNKNOWN.to_string(),
        display: std::env::consts::OS.to_string(),
        hardware: std::env::consts::ARCH.to_string(),
        id: UNKNOWN.to_string(),
        manufacturer: UNKNOWN.to_string(),
        product: UNKNOWN.to_string(),
        tags: std::env::consts::FAMILY.to_string(),
        model: UNKNOWN.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_os_release() {
        let content = r#"
# comment
NAME="Debian GNU/Linux"
ID=debian
VERSION_ID='12'
PRETTY_NAME="Debian GNU/Linux 12 (bookworm)"
"#;
        let values = parse_os_release(content);

        assert_eq!(values["NAME"], "Debian GNU/Linux");
        assert_eq!(values["ID"], "debian");
        assert_eq!(values["VERSION_ID"], "12");
        assert_eq!(values.len(), 4);
    }

    #[test]
    fn test_lookup_fallbacks() {
        let values = parse_os_release("VERSION_ID=24.04\n");
        assert_eq!(lookup(&values, &["BUILD_ID", "VERSION_ID"]), "24.04");
        assert_eq!(lookup(&values, &["PRETTY_NAME"]), "unknown");
    }

    #[test]
    fn test_build_info_is_available() {
        let info = build_info().unwrap();
        assert!(info.sdk_int.is_none());
        assert!(!info.hardware.is_empty());
    }
}
