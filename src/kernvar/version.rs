/// Kernel feature levels relevant for deadline scheduling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum KernelVersion {
    NotSupported,
    /// Basic EDF support.
    V3_14,
    /// EDF only with out-of-tree patches.
    V4_0,
    /// Full EDF.
    V4_13,
    /// Full EDF with GRUB-PA.
    V4_16,
    /// 5.0 and newer.
    V5_0,
}

/// Maps a `uname -r` style release string (e.g. `5.15.0-91-generic`) to a
/// [`KernelVersion`].
pub fn check_kernel(release: &str) -> KernelVersion {
    let mut parts = release
        .split(|c: char| !c.is_ascii_digit())
        .map(|p| p.parse::<u32>().ok());
    let major = parts.next().flatten();
    let minor = parts.next().flatten().unwrap_or(0);

    match major {
        Some(3) if minor >= 14 => KernelVersion::V3_14,
        Some(4) if minor < 13 => KernelVersion::V4_0,
        Some(4) if minor < 16 => KernelVersion::V4_13,
        Some(4) => KernelVersion::V4_16,
        Some(major) if major >= 5 => KernelVersion::V5_0,
        _ => KernelVersion::NotSupported,
    }
}
