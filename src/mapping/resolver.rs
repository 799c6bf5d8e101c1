//! Transition → ordered action list

use crate::mapping::action::Action;
use crate::mapping::chord::{ChordDefinition, ChordId};
use crate::mapping::tracker::{Edge, Transition};

/// An action with its origin, ready for dispatch
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolvedAction<'a> {
    pub chord: ChordId,
    pub edge: Edge,
    /// Position inside the chord's activation or deactivation list
    pub position: usize,
    pub action: &'a Action,
}

pub struct ActionResolver<'a> {
    chords: &'a [ChordDefinition],
}

impl<'a> ActionResolver<'a> {
    pub fn new(chords: &'a [ChordDefinition]) -> Self {
        Self { chords }
    }

    /// Actions for one transition; empty for the release of a momentary chord
    pub fn resolve(&self, transition: &Transition) -> &'a [Action] {
        let Some(chord) = self.chords.get(transition.chord) else {
            return &[];
        };
        match transition.edge {
            Edge::Activate => &chord.on_activate,
            Edge::Deactivate => chord.on_deactivate.as_deref().unwrap_or(&[]),
        }
    }

    /// Flattens transitions into dispatch order, keeping transition order first
    pub fn resolve_all(&self, transitions: &[Transition]) -> Vec<ResolvedAction<'a>> {
        transitions
            .iter()
            .flat_map(|transition| {
                self.resolve(transition)
                    .iter()
                    .enumerate()
                    .map(move |(position, action)| ResolvedAction {
                        chord: transition.chord,
                        edge: transition.edge,
                        position,
                        action,
                    })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::action::{OutputEvent, ShellCommand};
    use crate::mapping::chord::Behavior;

    fn chords() -> Vec<ChordDefinition> {
        vec![
            ChordDefinition {
                id: 0,
                name: None,
                mode: None,
                behavior: Behavior::Momentary,
                predicates: Vec::new(),
                on_activate: vec![
                    Action::EmitOutput(OutputEvent::PlayScaleDegree { degree: 0 }),
                    Action::RunCommand(ShellCommand::new("true")),
                ],
                on_deactivate: Some(vec![Action::EmitOutput(OutputEvent::Release)]),
            },
            ChordDefinition {
                id: 1,
                name: Some("momentary".into()),
                mode: None,
                behavior: Behavior::Momentary,
                predicates: Vec::new(),
                on_activate: vec![Action::EmitOutput(OutputEvent::CommitTonic)],
                on_deactivate: None,
            },
        ]
    }

    #[test]
    fn momentary_release_resolves_to_nothing() {
        let chords = chords();
        let resolver = ActionResolver::new(&chords);
        let release = Transition {
            chord: 1,
            edge: Edge::Deactivate,
        };
        assert!(resolver.resolve(&release).is_empty());
    }

    #[test]
    fn resolve_all_keeps_declared_order() {
        let chords = chords();
        let resolver = ActionResolver::new(&chords);
        let resolved = resolver.resolve_all(&[
            Transition {
                chord: 1,
                edge: Edge::Activate,
            },
            Transition {
                chord: 0,
                edge: Edge::Activate,
            },
            Transition {
                chord: 0,
                edge: Edge::Deactivate,
            },
        ]);

        let origins: Vec<_> = resolved
            .iter()
            .map(|resolved| (resolved.chord, resolved.edge, resolved.position))
            .collect();
        assert_eq!(
            origins,
            vec![
                (1, Edge::Activate, 0),
                (0, Edge::Activate, 0),
                (0, Edge::Activate, 1),
                (0, Edge::Deactivate, 0),
            ]
        );
        assert_eq!(
            resolved[2].action,
            &Action::RunCommand(ShellCommand::new("true"))
        );
    }
}
