//! Approach, pair, and signal definitions shared by firmware and host targets.
//!
//! Four approaches feed the intersection. Opposite approaches share
//! right-of-way and are grouped into two pairs; every signal change in the
//! controller is expressed against a [`PairId`] so both members move together.
//! Everything in this module is `no_std` friendly so the same data can be
//! compiled for both the STM32 firmware and the host-side emulator.

use core::fmt;

/// Number of approaches wired to the controller.
pub const APPROACH_COUNT: usize = 4;

/// Number of approach pairs sharing right-of-way.
pub const PAIR_COUNT: usize = 2;

/// Identifier for one of the four inbound approaches.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum ApproachId {
    North,
    East,
    South,
    West,
}

/// Raised when a raw approach index falls outside `0..=3`.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct InvalidApproach(pub u8);

impl fmt::Display for InvalidApproach {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "approach index {} out of range 0-3", self.0)
    }
}

impl ApproachId {
    /// Every approach in index order.
    pub const ALL: [ApproachId; APPROACH_COUNT] = [
        ApproachId::North,
        ApproachId::East,
        ApproachId::South,
        ApproachId::West,
    ];

    /// Deterministic index for lookups into [`ALL_APPROACHES`].
    #[must_use]
    pub const fn as_index(self) -> usize {
        match self {
            ApproachId::North => 0,
            ApproachId::East => 1,
            ApproachId::South => 2,
            ApproachId::West => 3,
        }
    }

    /// Attempts to construct an [`ApproachId`] from a raw index.
    #[must_use]
    pub const fn from_index(index: usize) -> Option<Self> {
        match index {
            0 => Some(ApproachId::North),
            1 => Some(ApproachId::East),
            2 => Some(ApproachId::South),
            3 => Some(ApproachId::West),
            _ => None,
        }
    }

    /// Pair that this approach shares right-of-way with.
    #[must_use]
    pub const fn pair(self) -> PairId {
        match self {
            ApproachId::North | ApproachId::South => PairId::A,
            ApproachId::East | ApproachId::West => PairId::B,
        }
    }
}

impl TryFrom<u8> for ApproachId {
    type Error = InvalidApproach;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::from_index(usize::from(value)).ok_or(InvalidApproach(value))
    }
}

impl fmt::Display for ApproachId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(approach_by_id(*self).name)
    }
}

/// Raised when a raw pair index falls outside `0..=1`.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct InvalidPair(pub u8);

impl fmt::Display for InvalidPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pair index {} out of range 0-1", self.0)
    }
}

/// Two opposite approaches that receive right-of-way together.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum PairId {
    /// Approaches 0 and 2.
    A,
    /// Approaches 1 and 3.
    B,
}

impl PairId {
    /// Both pairs in index order.
    pub const ALL: [PairId; PAIR_COUNT] = [PairId::A, PairId::B];

    #[must_use]
    pub const fn as_index(self) -> usize {
        match self {
            PairId::A => 0,
            PairId::B => 1,
        }
    }

    #[must_use]
    pub const fn from_index(index: usize) -> Option<Self> {
        match index {
            0 => Some(PairId::A),
            1 => Some(PairId::B),
            _ => None,
        }
    }

    /// The two approaches belonging to this pair.
    #[must_use]
    pub const fn approaches(self) -> [ApproachId; 2] {
        match self {
            PairId::A => [ApproachId::North, ApproachId::South],
            PairId::B => [ApproachId::East, ApproachId::West],
        }
    }

    /// The perpendicular pair that must be held at stop while this one flows.
    #[must_use]
    pub const fn opposite(self) -> PairId {
        match self {
            PairId::A => PairId::B,
            PairId::B => PairId::A,
        }
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            PairId::A => "pair-a",
            PairId::B => "pair-b",
        }
    }
}

impl TryFrom<u8> for PairId {
    type Error = InvalidPair;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::from_index(usize::from(value)).ok_or(InvalidPair(value))
    }
}

impl fmt::Display for PairId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Right-of-way state owned by the pair state machine.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Default)]
pub enum SignalState {
    #[default]
    Stop,
    Caution,
    Go,
}

impl SignalState {
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            SignalState::Stop => "stop",
            SignalState::Caution => "caution",
            SignalState::Go => "go",
        }
    }
}

impl fmt::Display for SignalState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Lamp command handed to the light-output sink.
///
/// `Off` never appears in [`SignalState`]; it is only used to blank the lamps
/// during bring-up.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SignalOutput {
    Stop,
    Caution,
    Go,
    Off,
}

impl From<SignalState> for SignalOutput {
    fn from(state: SignalState) -> Self {
        match state {
            SignalState::Stop => SignalOutput::Stop,
            SignalState::Caution => SignalOutput::Caution,
            SignalState::Go => SignalOutput::Go,
        }
    }
}

impl SignalOutput {
    /// Lamp levels for the bi-colour head: `(red, green)`, amber lights both.
    #[must_use]
    pub const fn lamp_levels(self) -> (bool, bool) {
        match self {
            SignalOutput::Stop => (true, false),
            SignalOutput::Caution => (true, true),
            SignalOutput::Go => (false, true),
            SignalOutput::Off => (false, false),
        }
    }
}

/// Metadata describing how an approach is wired on the board.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct ApproachLine {
    pub id: ApproachId,
    pub name: &'static str,
    pub red_pin: &'static str,
    pub green_pin: &'static str,
    pub detector_pin: &'static str,
}

impl ApproachLine {
    pub const fn new(
        id: ApproachId,
        name: &'static str,
        red_pin: &'static str,
        green_pin: &'static str,
        detector_pin: &'static str,
    ) -> Self {
        Self {
            id,
            name,
            red_pin,
            green_pin,
            detector_pin,
        }
    }
}

/// Compile-time catalog of every approach.
pub const ALL_APPROACHES: [ApproachLine; APPROACH_COUNT] = [
    ApproachLine::new(ApproachId::North, "approach-0", "PB10", "PB4", "PC10"),
    ApproachLine::new(ApproachId::East, "approach-1", "PB5", "PB3", "PC11"),
    ApproachLine::new(ApproachId::South, "approach-2", "PB2", "PB1", "PC12"),
    ApproachLine::new(ApproachId::West, "approach-3", "PB14", "PB13", "PC13"),
];

/// Retrieve approach metadata by identifier.
#[must_use]
pub const fn approach_by_id(id: ApproachId) -> ApproachLine {
    ALL_APPROACHES[id.as_index()]
}
