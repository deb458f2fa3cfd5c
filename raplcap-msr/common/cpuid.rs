use crate::common::arch::{self, CpuModel};
use crate::error::{RaplCapError, Result};

/// Vendor string reported by Intel processors in CPUID leaf 0
pub const VENDOR_INTEL: &[u8; 12] = b"GenuineIntel";

/// Vendor, family and model of the running processor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CpuIdentity {
    pub vendor_intel: bool,
    pub family: u32,
    pub model: u32,
}

impl CpuIdentity {
    /// Entry of the support table matching this identity
    pub fn supported_model(&self) -> Result<&'static CpuModel> {
        if !self.vendor_intel {
            return Err(RaplCapError::UnsupportedCpu(
                "vendor is not GenuineIntel".to_string(),
            ));
        }
        arch::lookup(self.family, self.model).ok_or_else(|| {
            RaplCapError::UnsupportedCpu(format!(
                "Family={}, Model={:02X}",
                self.family, self.model
            ))
        })
    }
}

#[cfg(target_arch = "x86_64")]
pub fn cpuid(eax: u32, ecx: u32) -> Option<(u32, u32, u32, u32)> {
    let mut ebx: u32;
    let mut edx: u32;
    let mut eax_out = eax;
    let mut ecx_out = ecx;

    // SAFETY: CPUID is available on every x86_64 processor and only writes
    // the four named registers; rbx is saved and restored around it.
    unsafe {
        std::arch::asm!(
            "mov {0:r}, rbx",
            "cpuid",
            "xchg {0:r}, rbx",
            out(reg) ebx,
            inout("eax") eax_out,
            inout("ecx") ecx_out,
            out("edx") edx,
            options(nostack, preserves_flags)
        );
    }

    Some((eax_out, ebx, ecx_out, edx))
}

#[cfg(not(target_arch = "x86_64"))]
pub fn cpuid(_eax: u32, _ecx: u32) -> Option<(u32, u32, u32, u32)> {
    None
}

/// Assemble the 12-byte vendor string from leaf 0 (EBX, EDX, ECX order)
pub fn decode_vendor(ebx: u32, edx: u32, ecx: u32) -> [u8; 12] {
    let mut vendor = [0u8; 12];
    vendor[0..4].copy_from_slice(&ebx.to_le_bytes());
    vendor[4..8].copy_from_slice(&edx.to_le_bytes());
    vendor[8..12].copy_from_slice(&ecx.to_le_bytes());
    vendor
}

/// Family and model from leaf 1 EAX
///
/// Only the low nibble of the extended family (bits 23:20) is ORed in, as the
/// high nibble of the family, and unconditionally instead of only when the
/// base family is 0xF. Every supported part is family 6 with a zero extended
/// family, so the result is the same there.
pub fn decode_family_model(eax: u32) -> (u32, u32) {
    let family = ((eax >> 8) & 0xF) | ((eax >> 16) & 0xF0);
    let model = ((eax >> 4) & 0xF) | ((eax >> 12) & 0xF0);
    (family, model)
}

/// Identify the running processor
///
/// Returns [`RaplCapError::UnsupportedCpu`] where CPUID does not exist.
pub fn identify() -> Result<CpuIdentity> {
    let (_max_leaf, ebx, ecx, edx) = cpuid(0, 0).ok_or_else(|| {
        RaplCapError::UnsupportedCpu("CPUID is not available on this architecture".to_string())
    })?;
    let vendor = decode_vendor(ebx, edx, ecx);
    let vendor_intel = &vendor == VENDOR_INTEL;

    let (eax, _ebx, _ecx, _edx) = cpuid(1, 0).ok_or_else(|| {
        RaplCapError::UnsupportedCpu("CPUID is not available on this architecture".to_string())
    })?;
    let (family, model) = decode_family_model(eax);

    tracing::debug!(
        "CPUID: vendor={}, family={:02X}, model={:02X}",
        String::from_utf8_lossy(&vendor),
        family,
        model
    );

    Ok(CpuIdentity {
        vendor_intel,
        family,
        model,
    })
}

/// Identify the running processor and look it up in the support table
pub fn supported_model() -> Result<&'static CpuModel> {
    let identity = identify()?;
    let model = identity.supported_model().map_err(|e| {
        tracing::error!("CPU not supported: {}", e);
        e
    })?;
    tracing::info!("Detected CPU: {} (model {:02X})", model.name, model.id);
    Ok(model)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_vendor() {
        // "Genu" "ineI" "ntel"
        let vendor = decode_vendor(0x756E_6547, 0x4965_6E69, 0x6C65_746E);
        assert_eq!(&vendor, VENDOR_INTEL);

        let amd = decode_vendor(0x6874_7541, 0x6974_6E65, 0x444D_4163);
        assert_eq!(&amd, b"AuthenticAMD");
    }

    #[test]
    fn test_decode_family_model() {
        // Skylake desktop: family 6, model 0x5E, stepping 3
        assert_eq!(decode_family_model(0x0005_06E3), (6, 0x5E));
        // Sandy Bridge: model 0x2A
        assert_eq!(decode_family_model(0x0002_06A7), (6, 0x2A));
        // Sapphire Rapids: model 0x8F
        assert_eq!(decode_family_model(0x0008_06F8), (6, 0x8F));
    }

    #[test]
    fn test_extended_family_ored_unconditionally() {
        // Base family 6 with a non-zero extended family field: the extended
        // bits still land in the family, so the part is not family 6.
        let eax = (0x01 << 20) | (0x6 << 8) | (0xA << 4);
        assert_eq!(decode_family_model(eax), (0x16, 0x0A));

        // AMD Zen: base family 0xF, extended family 0x8 reads as 0x8F, not 0x17
        assert_eq!(decode_family_model(0x0080_0F11).0, 0x8F);

        // Bits 27:24 of the extended family are dropped
        assert_eq!(decode_family_model((0xF1 << 20) | (0x6 << 8)).0, 0x16);
    }

    #[test]
    fn test_supported_model_rejects_non_intel() {
        let identity = CpuIdentity {
            vendor_intel: false,
            family: 6,
            model: 0x2A,
        };
        assert!(matches!(
            identity.supported_model(),
            Err(RaplCapError::UnsupportedCpu(_))
        ));
    }

    #[test]
    fn test_supported_model_rejects_unknown_model() {
        let identity = CpuIdentity {
            vendor_intel: true,
            family: 6,
            model: 0x01,
        };
        assert!(identity.supported_model().is_err());

        let identity = CpuIdentity {
            vendor_intel: true,
            family: 6,
            model: 0x2A,
        };
        assert_eq!(identity.supported_model().unwrap().name, "Sandy Bridge");
    }

    #[test]
    fn test_identify_does_not_panic() {
        let identity = identify();
        println!("CPUID identity: {identity:?}");
        #[cfg(not(target_arch = "x86_64"))]
        assert!(matches!(identity, Err(RaplCapError::UnsupportedCpu(_))));
    }
}
