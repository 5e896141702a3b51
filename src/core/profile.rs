//! Attribute profile - The fixed bundle of demotions applied to matched processes

use serde::{Deserialize, Serialize};

/// Default affinity mask: cores 20-23
pub const DEFAULT_AFFINITY_MASK: u64 = 0xF0_0000;

/// Efficiency-mode bit of the power throttling control/state masks
/// (`PROCESS_POWER_THROTTLING_EXECUTION_SPEED`)
pub const EFFICIENCY_MODE: u32 = 0x0000_0001;

/// Version of the power throttling request structure
pub const POWER_THROTTLING_VERSION: u32 = 1;

/// CPU scheduling priority class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum PriorityClass {
    Idle,
    #[default]
    BelowNormal,
    Normal,
    AboveNormal,
    High,
}

impl PriorityClass {
    /// Unix nice value closest to this class
    #[cfg_attr(not(unix), allow(dead_code))]
    pub fn nice_value(&self) -> i32 {
        match self {
            Self::Idle => 19,
            Self::BelowNormal => 10,
            Self::Normal => 0,
            Self::AboveNormal => -5,
            Self::High => -10,
        }
    }
}

/// I/O priority hint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum IoPriority {
    VeryLow,
    #[default]
    Low,
    Normal,
}

impl IoPriority {
    /// `IO_PRIORITY_HINT` value passed to the process information call
    #[cfg_attr(not(windows), allow(dead_code))]
    pub fn raw(&self) -> u32 {
        match self {
            Self::VeryLow => 0,
            Self::Low => 1,
            Self::Normal => 2,
        }
    }
}

/// GPU scheduling priority class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum GpuPriority {
    Idle,
    #[default]
    BelowNormal,
    Normal,
    AboveNormal,
    High,
}

impl GpuPriority {
    /// `D3DKMT_SCHEDULINGPRIORITYCLASS` value
    #[cfg_attr(not(windows), allow(dead_code))]
    pub fn raw(&self) -> u32 {
        match self {
            Self::Idle => 0,
            Self::BelowNormal => 1,
            Self::Normal => 2,
            Self::AboveNormal => 3,
            Self::High => 4,
        }
    }
}

/// Power throttling request, laid out the way the OS expects it
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PowerThrottlingState {
    pub version: u32,
    pub control_mask: u32,
    pub state_mask: u32,
}

impl PowerThrottlingState {
    /// Request that turns efficiency mode on
    pub fn efficiency_mode() -> Self {
        Self {
            version: POWER_THROTTLING_VERSION,
            control_mask: EFFICIENCY_MODE,
            state_mask: EFFICIENCY_MODE,
        }
    }
}

/// The demotions applied to every matched process.
///
/// Built once at startup and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeProfile {
    /// CPU scheduling priority
    #[serde(default)]
    pub priority_class: PriorityClass,
    /// Bit i set = the process may run on core i
    #[serde(default = "default_affinity_mask")]
    pub affinity_mask: u64,
    /// I/O priority
    #[serde(default)]
    pub io_priority: IoPriority,
    /// GPU scheduling priority
    #[serde(default)]
    pub gpu_priority: GpuPriority,
    /// Enable efficiency mode
    #[serde(default = "default_power_throttling")]
    pub power_throttling: bool,
}

fn default_affinity_mask() -> u64 {
    DEFAULT_AFFINITY_MASK
}

fn default_power_throttling() -> bool {
    true
}

impl Default for AttributeProfile {
    fn default() -> Self {
        Self {
            priority_class: PriorityClass::BelowNormal,
            affinity_mask: DEFAULT_AFFINITY_MASK,
            io_priority: IoPriority::Low,
            gpu_priority: GpuPriority::BelowNormal,
            power_throttling: true,
        }
    }
}

impl AttributeProfile {
    /// Core indices selected by the affinity mask, recomputed on every call
    pub fn core_list(&self) -> Vec<usize> {
        decode_affinity_mask(self.affinity_mask)
    }

    /// Power throttling request for this profile, if enabled
    pub fn power_throttling_state(&self) -> Option<PowerThrottlingState> {
        self.power_throttling.then(PowerThrottlingState::efficiency_mode)
    }
}

/// Decode an affinity bitmask into ascending core indices
pub fn decode_affinity_mask(mask: u64) -> Vec<usize> {
    (0..u64::BITS as usize)
        .filter(|&core| mask & (1u64 << core) != 0)
        .collect()
}

/// Encode core indices back into a mask for `usize`-wide OS calls.
/// Cores that do not fit are dropped.
#[cfg_attr(not(windows), allow(dead_code))]
pub fn encode_affinity_mask(cores: &[usize]) -> usize {
    let mut mask: usize = 0;
    for &core in cores {
        if core < usize::BITS as usize {
            mask |= 1 << core;
        }
    }
    mask
}
