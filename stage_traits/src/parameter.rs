//! Axis parameter register map of the TMCM-3212 three-axis module.
//!
//! The discriminants are the register IDs transmitted on the wire. They are
//! part of the controller's documented interface and must never be renumbered;
//! add new entries instead and bump [`REGISTER_MAP_VERSION`].

/// Version of the register map below. Bump when entries are added.
pub const REGISTER_MAP_VERSION: u16 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum AxisParameter {
    TargetPosition = 0,
    ActualPosition = 1,
    TargetVelocity = 2,
    ActualVelocity = 3,
    MaxVelocity = 4,
    MaxAcceleration = 5,
    RunCurrent = 6,
    StandbyCurrent = 7,
    PositionReachedFlag = 8,
    HomeSwitch = 9,
    RightEndstop = 10,
    LeftEndstop = 11,
    RightLimit = 12,
    LeftLimit = 13,
    RampType = 14,
    StartVelocity = 15,
    StartAcceleration = 16,
    MaxDeceleration = 17,
    StopVelocity = 20,
    StopDeceleration = 21,
    SwapStopSwitches = 33,
    EnableSoftStop = 34,
    MicrostepResolution = 140,
    SmartEnergyMinimum = 168,
    SmartEnergyDownStep = 169,
    SmartEnergyHysteresis = 170,
    SmartEnergyUpStep = 171,
    SmartEnergyHysteresisStart = 172,
    StallGuard2FilterEnable = 173,
    StallGuard2Threshold = 174,
    SmartEnergyStallVelocity = 181,
    SmartEnergyThresholdSpeed = 182,
    PwmThresholdSpeed = 186,
    PwmGrad = 187,
    PwmAmplitude = 188,
    PwmScale = 189,
    PwmMode = 190,
    PwmFrequency = 191,
    PwmAutoscale = 192,
    ReferenceSearchMode = 193,
    ReferenceSearchSpeed = 194,
    RefSwitchSpeed = 195,
    RightLimitSwitchPosition = 196,
    LastReferencePosition = 197,
    MotorFullStepResolution = 202,
    FreewheelingMode = 204,
    LoadValue = 206,
    ErrorFlags = 207,
    StatusFlags = 208,
    PowerDownDelay = 214,
    ReverseShaft = 251,
}

impl AxisParameter {
    /// Every register in ascending ID order.
    pub const ALL: &'static [AxisParameter] = &[
        Self::TargetPosition,
        Self::ActualPosition,
        Self::TargetVelocity,
        Self::ActualVelocity,
        Self::MaxVelocity,
        Self::MaxAcceleration,
        Self::RunCurrent,
        Self::StandbyCurrent,
        Self::PositionReachedFlag,
        Self::HomeSwitch,
        Self::RightEndstop,
        Self::LeftEndstop,
        Self::RightLimit,
        Self::LeftLimit,
        Self::RampType,
        Self::StartVelocity,
        Self::StartAcceleration,
        Self::MaxDeceleration,
        Self::StopVelocity,
        Self::StopDeceleration,
        Self::SwapStopSwitches,
        Self::EnableSoftStop,
        Self::MicrostepResolution,
        Self::SmartEnergyMinimum,
        Self::SmartEnergyDownStep,
        Self::SmartEnergyHysteresis,
        Self::SmartEnergyUpStep,
        Self::SmartEnergyHysteresisStart,
        Self::StallGuard2FilterEnable,
        Self::StallGuard2Threshold,
        Self::SmartEnergyStallVelocity,
        Self::SmartEnergyThresholdSpeed,
        Self::PwmThresholdSpeed,
        Self::PwmGrad,
        Self::PwmAmplitude,
        Self::PwmScale,
        Self::PwmMode,
        Self::PwmFrequency,
        Self::PwmAutoscale,
        Self::ReferenceSearchMode,
        Self::ReferenceSearchSpeed,
        Self::RefSwitchSpeed,
        Self::RightLimitSwitchPosition,
        Self::LastReferencePosition,
        Self::MotorFullStepResolution,
        Self::FreewheelingMode,
        Self::LoadValue,
        Self::ErrorFlags,
        Self::StatusFlags,
        Self::PowerDownDelay,
        Self::ReverseShaft,
    ];

    /// Register ID as sent to the controller.
    #[inline]
    pub fn id(self) -> u8 {
        self as u8
    }

    /// Look up a register by wire ID.
    pub fn from_id(id: u8) -> Option<Self> {
        Self::ALL.iter().copied().find(|p| p.id() == id)
    }

    /// Registers the controller only reports; writes are rejected.
    pub fn is_read_only(self) -> bool {
        matches!(
            self,
            Self::ActualVelocity
                | Self::PositionReachedFlag
                | Self::HomeSwitch
                | Self::RightEndstop
                | Self::LeftEndstop
                | Self::LastReferencePosition
                | Self::LoadValue
                | Self::ErrorFlags
                | Self::StatusFlags
        )
    }
}

impl TryFrom<u8> for AxisParameter {
    type Error = u8;

    fn try_from(id: u8) -> Result<Self, Self::Error> {
        Self::from_id(id).ok_or(id)
    }
}

impl std::fmt::Display for AxisParameter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}({})", self, self.id())
    }
}
