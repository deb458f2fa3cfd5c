// Supported CPU models and the RAPL behavior class of each
//
// Reference: Intel® 64 and IA-32 Architectures Software Developer's Manual,
// Volume 4, and the model list in the Linux kernel's intel-family.h.

/// How a model's RAPL registers are scaled and laid out
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelClass {
    /// Default units and codec; PACKAGE has long and short term constraints
    Client,
    /// Client part that also exposes peak power (PL4) on PACKAGE
    ClientPeakPower,
    /// Server part with a fixed DRAM energy unit
    Server,
    /// Server part with fixed DRAM and PSYS energy units and a wider PSYS limit layout
    ServerPsys { psys_width: u8 },
    /// Xeon Phi with its own fixed DRAM energy unit
    XeonPhi,
    /// Silvermont-era Atom: milliwatt/microjoule units, linear time window
    Atom,
    /// Airmont: Atom power units, default energy units, 5 s CORE time window
    AtomAirmont,
}

/// An entry of the support table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CpuModel {
    pub id: u32,
    pub name: &'static str,
    pub class: ModelClass,
}

/// All supported parts are family 6
pub const SUPPORTED_FAMILY: u32 = 6;

const fn model(id: u32, name: &'static str, class: ModelClass) -> CpuModel {
    CpuModel { id, name, class }
}

use ModelClass::*;

pub static SUPPORTED_MODELS: &[CpuModel] = &[
    // Sandy Bridge
    model(0x2A, "Sandy Bridge", Client),
    model(0x2D, "Sandy Bridge-X", Client),
    // Ivy Bridge
    model(0x3A, "Ivy Bridge", Client),
    model(0x3E, "Ivy Bridge-X", Client),
    // Haswell
    model(0x3C, "Haswell", Client),
    model(0x45, "Haswell-L", Client),
    model(0x46, "Haswell-G", Client),
    model(0x3F, "Haswell-X", Server),
    // Broadwell
    model(0x3D, "Broadwell", Client),
    model(0x47, "Broadwell-G", Client),
    model(0x4F, "Broadwell-X", Server),
    model(0x56, "Broadwell-D", Server),
    // Skylake and derivatives
    model(0x4E, "Skylake-L", Client),
    model(0x5E, "Skylake", Client),
    model(0x55, "Skylake-X", Server),
    model(0x8E, "Kaby Lake-L", Client),
    model(0x9E, "Kaby Lake", Client),
    model(0x66, "Cannon Lake-L", Client),
    model(0xA5, "Comet Lake", Client),
    model(0xA6, "Comet Lake-L", Client),
    // Ice Lake
    model(0x7D, "Ice Lake", Client),
    model(0x7E, "Ice Lake-L", Client),
    model(0x6A, "Ice Lake-X", Server),
    model(0x6C, "Ice Lake-D", Server),
    model(0x8A, "Lakefield", Client),
    // Tiger Lake / Rocket Lake
    model(0x8C, "Tiger Lake-L", ClientPeakPower),
    model(0x8D, "Tiger Lake", Client),
    model(0xA7, "Rocket Lake", Client),
    // Alder Lake / Raptor Lake
    model(0x97, "Alder Lake", ClientPeakPower),
    model(0x9A, "Alder Lake-L", ClientPeakPower),
    model(0xBE, "Alder Lake-N", ClientPeakPower),
    model(0xB7, "Raptor Lake", ClientPeakPower),
    model(0xBA, "Raptor Lake-P", ClientPeakPower),
    model(0xBF, "Raptor Lake-S", ClientPeakPower),
    // Meteor Lake / Arrow Lake / Lunar Lake
    model(0xAA, "Meteor Lake-L", ClientPeakPower),
    model(0xAC, "Meteor Lake", ClientPeakPower),
    model(0xB5, "Arrow Lake-U", ClientPeakPower),
    model(0xC5, "Arrow Lake-H", ClientPeakPower),
    model(0xC6, "Arrow Lake", Client),
    model(0xBD, "Lunar Lake-M", ClientPeakPower),
    // Xeon Scalable with platform (PSYS) power limits
    model(0x8F, "Sapphire Rapids-X", ServerPsys { psys_width: 17 }),
    model(0xCF, "Emerald Rapids-X", ServerPsys { psys_width: 17 }),
    model(0xAD, "Granite Rapids-X", ServerPsys { psys_width: 16 }),
    model(0xAE, "Granite Rapids-D", ServerPsys { psys_width: 16 }),
    model(0xAF, "Sierra Forest-X", ServerPsys { psys_width: 16 }),
    model(0xB6, "Grand Ridge", ServerPsys { psys_width: 16 }),
    // Atom
    model(0x37, "Atom Silvermont", Atom),
    model(0x4A, "Atom Silvermont-MID", Atom),
    model(0x5A, "Atom Airmont-MID", Atom),
    model(0x5D, "Atom SoFIA", Atom),
    model(0x4C, "Atom Airmont", AtomAirmont),
    model(0x5C, "Atom Goldmont", Client),
    model(0x5F, "Atom Goldmont-D", Client),
    model(0x7A, "Atom Goldmont Plus", Client),
    model(0x86, "Atom Tremont-D", Client),
    model(0x96, "Atom Tremont-L", Client),
    model(0x9C, "Atom Tremont", Client),
    // Xeon Phi
    model(0x57, "Xeon Phi Knights Landing", XeonPhi),
    model(0x85, "Xeon Phi Knights Mill", XeonPhi),
];

/// Find `(family, model)` in the support table
pub fn lookup(family: u32, model: u32) -> Option<&'static CpuModel> {
    if family != SUPPORTED_FAMILY {
        return None;
    }
    SUPPORTED_MODELS.iter().find(|m| m.id == model)
}
