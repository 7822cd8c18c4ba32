use robolink_wire::Command;

const CAPACITY: usize = 8;

/// Fixed-size ring of recently seen inbound commands.
///
/// The receive loop acknowledges every command frame but must deliver each
/// command to the control loop once, even when the peer retransmits because
/// an acknowledgement was lost. Membership uses command identity, so the
/// retransmitted copy matches the original regardless of flag bits.
pub(crate) struct RecentCommands {
    slots: [Option<Command>; CAPACITY],
    next: usize,
}

impl RecentCommands {
    pub(crate) fn new() -> Self {
        Self { slots: Default::default(), next: 0 }
    }

    pub(crate) fn contains(&self, command: &Command) -> bool {
        self.slots.iter().flatten().any(|seen| seen == command)
    }

    /// Record `command`, overwriting the oldest slot once full.
    pub(crate) fn insert(&mut self, command: Command) {
        self.slots[self.next % CAPACITY] = Some(command);
        self.next = self.next.wrapping_add(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn command(name: &str) -> Command {
        Command::new(name, "").unwrap()
    }

    #[test]
    fn remembers_recent_commands() {
        let mut recent = RecentCommands::new();
        let cmd = command("arm up");
        recent.insert(cmd.clone());
        assert!(recent.contains(&cmd));
        assert!(!recent.contains(&command("arm down")));
    }

    #[test]
    fn matching_ignores_acknowledgement_and_attempts() {
        let mut recent = RecentCommands::new();
        let cmd = command("grip");
        recent.insert(cmd.clone());

        let mut resent = cmd.clone();
        resent.acknowledge();
        resent.encode().unwrap();
        assert!(recent.contains(&resent));
    }

    #[test]
    fn oldest_entry_is_evicted_first() {
        let mut recent = RecentCommands::new();
        let batch: Vec<Command> =
            (0..=CAPACITY).map(|i| command(&format!("cmd-{i}"))).collect();
        for cmd in batch.iter().take(CAPACITY) {
            recent.insert(cmd.clone());
        }
        assert!(recent.contains(&batch[0]));

        recent.insert(batch[CAPACITY].clone());
        assert!(!recent.contains(&batch[0]));
        assert!(recent.contains(&batch[1]));
        assert!(recent.contains(&batch[CAPACITY]));
    }
}
