use std::io;

#[allow(dead_code)]
#[path = "../session.rs"]
mod session;

use session::{Session, TranscriptProfile};

fn main() -> io::Result<()> {
    for profile in TranscriptProfile::SCENARIOS {
        record_profile(profile)?;
    }
    Ok(())
}

fn record_profile(profile: TranscriptProfile) -> io::Result<()> {
    let mut session = Session::new(profile)?;
    let script: &[&str] = match profile {
        TranscriptProfile::SingleRequest => &[
            "detect 0",
            "status",
            "advance 3s",
            "status",
            "advance 2s",
            "status",
        ],
        TranscriptProfile::CompetingRequests => &[
            "detect 0",
            "advance 500ms",
            "detect 1",
            "advance 2500ms",
            "status",
            "advance 3s",
            "status",
        ],
        TranscriptProfile::BusyApproach => &[
            "detect 1",
            "advance 200ms",
            "detect 3",
            "advance 200ms",
            "detect 3",
            "detect 3",
            "advance 200ms",
            "detect 3",
            "advance 2400ms",
            "status",
            "advance 5s",
            "status",
        ],
        TranscriptProfile::Handoff => &[
            "detect 0",
            "advance 3s",
            "advance 500ms",
            "detect 1",
            "advance 3s",
            "status",
            "advance 1s",
            "status",
        ],
        TranscriptProfile::Interactive => &["help", "status"],
    };

    for line in script {
        session.handle_command(line)?;
    }
    Ok(())
}
