use std::collections::HashSet;
use std::path::PathBuf;

use super::models::Drive;
use crate::sandbox::{self, Sandbox};

/// Browsable roots. A restricted sandbox exposes only its own root; otherwise
/// the user's home directory followed by every mounted disk.
pub fn list_drives(sandbox: &Sandbox) -> Vec<Drive> {
    if let Some(root) = sandbox.root() {
        return vec![Drive {
            label: root.to_string(),
            path: root.to_string(),
            free: None,
            total: None,
        }];
    }

    let mut drives = Vec::new();
    if let Some(home) = home_dir() {
        drives.push(Drive {
            label: "Home".to_string(),
            path: sandbox::normalize(&home.to_string_lossy()),
            free: None,
            total: None,
        });
    }

    let disks = sysinfo::Disks::new_with_refreshed_list();
    let mut seen = HashSet::new();
    for disk in disks.iter() {
        let mount_point = sandbox::normalize(&disk.mount_point().to_string_lossy());
        if !seen.insert(mount_point.clone()) {
            continue;
        }
        drives.push(Drive {
            label: mount_point.clone(),
            path: mount_point,
            free: Some(disk.available_space()),
            total: Some(disk.total_space()),
        });
    }

    // containers without a readable mount table
    if seen.is_empty() && cfg!(unix) {
        drives.push(Drive {
            label: "/".to_string(),
            path: "/".to_string(),
            free: None,
            total: None,
        });
    }

    drives
}

fn home_dir() -> Option<PathBuf> {
    std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
}
