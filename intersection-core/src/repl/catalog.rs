//! Console command catalog.
//!
//! The parser and the `help` command read the same table, so keywords,
//! argument layouts, and usage strings stay in sync.

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CommandTag {
    Detect,
    Advance,
    Status,
    Help,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CommandSpec {
    pub name: &'static str,
    pub tag: CommandTag,
    pub usage: &'static str,
    pub summary: &'static str,
}

const COMMANDS: [CommandSpec; 4] = [
    CommandSpec {
        name: "detect",
        tag: CommandTag::Detect,
        usage: "detect <0-3>",
        summary: "report a vehicle on an approach",
    },
    CommandSpec {
        name: "advance",
        tag: CommandTag::Advance,
        usage: "advance <duration>",
        summary: "run the scheduler tick for a span of simulated time",
    },
    CommandSpec {
        name: "status",
        tag: CommandTag::Status,
        usage: "status",
        summary: "show signals, pending counts, queue, and window",
    },
    CommandSpec {
        name: "help",
        tag: CommandTag::Help,
        usage: "help [command]",
        summary: "list commands or describe one",
    },
];

#[must_use]
pub const fn commands() -> &'static [CommandSpec] {
    &COMMANDS
}

/// Case-insensitive lookup by keyword.
#[must_use]
pub fn find(name: &str) -> Option<&'static CommandSpec> {
    COMMANDS
        .iter()
        .find(|spec| spec.name.eq_ignore_ascii_case(name))
}
