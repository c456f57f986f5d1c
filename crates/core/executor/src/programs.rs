//! Compiled dialogue programs and a recording handler used for testing.

#[allow(dead_code)]
#[allow(missing_docs)]
pub mod tests {
    use std::collections::VecDeque;

    use crate::{
        DialogueHandler, Delivery, Instruction, InterruptHandle, Line, Node, OptionChoice,
        OptionItem, Program, Value, CONTENT_SALIENCY_COMPLEXITY_HEADER,
        CONTENT_SALIENCY_CONDITION_HEADER, NODE_GROUP_HEADER, NODE_GROUP_HUB_HEADER,
        TRACKING_VARIABLE_HEADER,
    };

    pub fn run_line(id: &str) -> Instruction {
        Instruction::RunLine { line_id: id.to_string(), substitution_count: 0 }
    }

    pub fn call(name: &str, arity: u32) -> [Instruction; 2] {
        [
            Instruction::PushFloat(f64::from(arity)),
            Instruction::CallFunc { function_name: name.to_string() },
        ]
    }

    /// `Start` delivers the lines `a`, `b` and `c`, then ends.
    #[must_use]
    pub fn three_lines_program() -> Program {
        let lines = vec![run_line("a"), run_line("b"), run_line("c")];
        Program::new().with_node(Node::new("Start", lines))
    }

    /// `Start` offers `line:yes` and `line:no`, then delivers `line:chose-yes` or
    /// `line:chose-no`.
    #[must_use]
    pub fn options_program() -> Program {
        Program::new().with_node(Node::new(
            "Start",
            vec![
                Instruction::AddOption {
                    line_id: "line:yes".into(),
                    destination: 4,
                    substitution_count: 0,
                    has_condition: false,
                },
                Instruction::AddOption {
                    line_id: "line:no".into(),
                    destination: 7,
                    substitution_count: 0,
                    has_condition: false,
                },
                Instruction::ShowOptions,
                Instruction::PeekAndJump,
                // 4
                Instruction::Pop,
                run_line("line:chose-yes"),
                Instruction::JumpTo { destination: 9 },
                // 7
                Instruction::Pop,
                run_line("line:chose-no"),
                // 9
                Instruction::Stop,
            ],
        ))
    }

    /// `Start` delivers `before`, detours through `Aside`, then delivers `after`.
    #[must_use]
    pub fn detour_program() -> Program {
        Program::new()
            .with_node(Node::new(
                "Start",
                vec![
                    run_line("before"),
                    Instruction::DetourToNode { node_name: "Aside".into() },
                    run_line("after"),
                ],
            ))
            .with_node(Node::new("Aside", vec![run_line("aside"), Instruction::Return]))
    }

    /// `Start` detours into `Middle`, which detours into `Inner`, which jumps to `Target`.
    #[must_use]
    pub fn unwind_program() -> Program {
        let detour = |to: &str| vec![Instruction::DetourToNode { node_name: to.into() }];
        let jump = |to: &str| vec![Instruction::RunNode { node_name: to.into() }];
        Program::new()
            .with_node(Node::new("Start", detour("Middle")))
            .with_node(Node::new("Middle", detour("Inner")))
            .with_node(Node::new("Inner", jump("Target")))
            .with_node(Node::new("Target", vec![run_line("target")]))
    }

    /// `Counted` returns immediately and counts its visits in `$visits`, declared as 0.
    #[must_use]
    pub fn tracking_program() -> Program {
        Program::new()
            .with_node(
                Node::new("Counted", vec![run_line("counted"), Instruction::Return])
                    .with_header(TRACKING_VARIABLE_HEADER, "$visits"),
            )
            .with_initial_value("$visits", 0.0)
    }

    /// Smart variables `$is_rich` (`$gold > 10`) and `$is_not_rich`, with `$gold` declared as 0.
    #[must_use]
    pub fn smart_variable_program() -> Program {
        let mut is_rich = vec![
            Instruction::PushVariable { variable_name: "$gold".into() },
            Instruction::PushFloat(10.0),
        ];
        is_rich.extend(call("Number.GreaterThan", 2));

        let mut is_not_rich = vec![Instruction::PushVariable { variable_name: "$is_rich".into() }];
        is_not_rich.extend(call("Bool.Not", 1));

        Program::new()
            .with_node(Node::new("$is_rich", is_rich))
            .with_node(Node::new("$is_not_rich", is_not_rich))
            .with_initial_value("$gold", 0.0)
    }

    /// `Start` picks between the line candidates `line:a` (complexity 1) and `line:b`
    /// (complexity 2), delivering the chosen id, or `line:none` when neither is eligible.
    ///
    /// The candidates' conditions are `$a_ok` and `$b_ok`, both declared true.
    #[must_use]
    pub fn line_group_program() -> Program {
        Program::new()
            .with_node(Node::new(
                "Start",
                vec![
                    Instruction::PushVariable { variable_name: "$a_ok".into() },
                    Instruction::AddSaliencyCandidate {
                        content_id: "line:a".into(),
                        complexity_score: 1,
                        destination: 8,
                    },
                    Instruction::PushVariable { variable_name: "$b_ok".into() },
                    Instruction::AddSaliencyCandidate {
                        content_id: "line:b".into(),
                        complexity_score: 2,
                        destination: 11,
                    },
                    Instruction::SelectSaliencyCandidate,
                    Instruction::JumpIfFalse { destination: 14 },
                    Instruction::Pop,
                    Instruction::PeekAndJump,
                    // 8
                    Instruction::Pop,
                    run_line("line:a"),
                    Instruction::Stop,
                    // 11
                    Instruction::Pop,
                    run_line("line:b"),
                    Instruction::Stop,
                    // 14
                    Instruction::Pop,
                    run_line("line:none"),
                    Instruction::Stop,
                ],
            ))
            .with_initial_value("$a_ok", true)
            .with_initial_value("$b_ok", true)
    }

    /// A node group `Greeting` with members gated on the smart variables of
    /// [`smart_variable_program`], plus a candidate naming a node that does not exist.
    #[must_use]
    pub fn node_group_program() -> Program {
        let member = |name: &str, condition: &str, line: &str| {
            Node::new(name, vec![run_line(line)])
                .with_header(NODE_GROUP_HEADER, "Greeting")
                .with_header(CONTENT_SALIENCY_CONDITION_HEADER, condition)
                .with_header(CONTENT_SALIENCY_COMPLEXITY_HEADER, "1")
        };

        smart_variable_program()
            .with_node(
                Node::new(
                    "Greeting",
                    vec![
                        Instruction::AddSaliencyCandidateFromNode {
                            node_name: "Greeting.Rich".into(),
                            destination: 7,
                        },
                        Instruction::AddSaliencyCandidateFromNode {
                            node_name: "Greeting.Missing".into(),
                            destination: 7,
                        },
                        Instruction::AddSaliencyCandidateFromNode {
                            node_name: "Greeting.Poor".into(),
                            destination: 9,
                        },
                        Instruction::SelectSaliencyCandidate,
                        Instruction::JumpIfFalse { destination: 11 },
                        Instruction::Pop,
                        Instruction::PeekAndJump,
                        // 7
                        Instruction::Pop,
                        Instruction::RunNode { node_name: "Greeting.Rich".into() },
                        // 9
                        Instruction::Pop,
                        Instruction::RunNode { node_name: "Greeting.Poor".into() },
                        // 11
                        Instruction::Stop,
                    ],
                )
                .with_header(NODE_GROUP_HUB_HEADER, "Greeting"),
            )
            .with_node(member("Greeting.Rich", "$is_rich", "line:rich"))
            .with_node(member("Greeting.Poor", "$is_not_rich", "line:poor"))
    }

    /// Something the executor told a [`RecordingHandler`].
    #[derive(Debug, Clone, PartialEq)]
    pub enum Event {
        Line(String),
        Command(String),
        Options(Vec<String>),
        NodeComplete(String),
        VariableSet(String, Value),
        DialogueComplete,
    }

    /// A handler that records every event.
    ///
    /// Lines and commands continue unless `defer` is set. Options take the next entry of
    /// `choices`, deferring once it runs out. Delivering the line `interrupt_on` requests an
    /// interrupt through `interrupt`.
    #[derive(Debug, Default)]
    pub struct RecordingHandler {
        pub events: Vec<Event>,
        pub lines: Vec<Line>,
        pub choices: VecDeque<usize>,
        pub defer: bool,
        pub interrupt_on: Option<(String, InterruptHandle)>,
    }

    impl RecordingHandler {
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        #[must_use]
        pub fn choosing(choices: impl IntoIterator<Item = usize>) -> Self {
            Self { choices: choices.into_iter().collect(), ..Self::default() }
        }

        #[must_use]
        pub fn deferring() -> Self {
            Self { defer: true, ..Self::default() }
        }

        pub fn line_ids(&self) -> Vec<&str> {
            self.lines.iter().map(|line| line.id.as_str()).collect()
        }

        pub fn completed_nodes(&self) -> Vec<&str> {
            self.events
                .iter()
                .filter_map(|event| match event {
                    Event::NodeComplete(name) => Some(name.as_str()),
                    _ => None,
                })
                .collect()
        }

        pub fn dialogue_completions(&self) -> usize {
            self.events.iter().filter(|event| **event == Event::DialogueComplete).count()
        }

        fn delivery(&self) -> Delivery {
            if self.defer {
                Delivery::Defer
            } else {
                Delivery::Continue
            }
        }
    }

    impl DialogueHandler for RecordingHandler {
        fn on_line(&mut self, line: &Line) -> Delivery {
            self.events.push(Event::Line(line.id.clone()));
            self.lines.push(line.clone());
            if let Some((id, handle)) = &self.interrupt_on {
                if *id == line.id {
                    handle.interrupt();
                }
            }
            self.delivery()
        }

        fn on_options(&mut self, options: &[OptionItem]) -> OptionChoice {
            self.events.push(Event::Options(options.iter().map(|o| o.line.id.clone()).collect()));
            self.choices.pop_front().map_or(OptionChoice::Defer, OptionChoice::Select)
        }

        fn on_command(&mut self, command: &str) -> Delivery {
            self.events.push(Event::Command(command.to_string()));
            self.delivery()
        }

        fn on_dialogue_complete(&mut self) {
            self.events.push(Event::DialogueComplete);
        }

        fn on_node_complete(&mut self, node_name: &str) {
            self.events.push(Event::NodeComplete(node_name.to_string()));
        }

        fn on_variable_set(&mut self, name: &str, value: &Value) {
            self.events.push(Event::VariableSet(name.to_string(), value.clone()));
        }
    }
}
