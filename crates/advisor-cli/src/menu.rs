//! Terminal menu state machine.
//!
//! `transition` is pure: it consumes one line of input and returns the next
//! state plus the action the binary should perform. All I/O lives in main.

use std::str::FromStr;

use portfolio_advisor::strategy::{MAX_ANSWER, MIN_ANSWER};
use portfolio_advisor::{AlgorithmPreferences, RecommendationRequest, StatModel};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Used when the amount prompt is left empty
pub const DEFAULT_AMOUNT: Decimal = dec!(1000);

const RISK_QUESTIONS: [&str; 3] = [
    "For how many years do you want to invest?\n  0-1 years  - 1\n  1-3 years  - 2\n  3+ years   - 3",
    "Which distribution of yearly returns do you prefer?\n  low risk - 1, medium risk - 2, high risk - 3",
    "Which portfolio do you prefer?\n  safest - 1, sharpest - 2, max return - 3",
];

/// Where the new-user questionnaire currently is
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Step {
    Name,
    MachineLearning,
    Model,
    Amount,
    /// Risk question 0..3
    Risk(usize),
}

/// Answers collected so far
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Draft {
    pub user_id: String,
    pub ml_answer: i64,
    pub preferences: AlgorithmPreferences,
    pub amount: Decimal,
    pub answers: Vec<i64>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MenuState {
    Main,
    Questionnaire { step: Step, draft: Draft },
    ViewProfile,
    Expert,
    /// Expert menu, waiting for the symbol to run the band strategy on
    BollingerSymbol,
    Exit,
}

#[derive(Clone, Debug, PartialEq)]
pub enum MenuAction {
    None,
    /// Input rejected; the state is unchanged
    Invalid(String),
    Recommend(RecommendationRequest),
    ShowProfile(String),
    ShowFrontier(StatModel),
    ShowDistribution(StatModel),
    ShowBollinger(String),
    RankInstruments(StatModel),
    Quit,
}

impl MenuState {
    pub fn prompt(&self) -> String {
        match self {
            Self::Main => "\nMain menu\n  1 - New user questionnaire\n  3 - View user portfolio\n  4 - Expert menu\n  8 - Exit\nSelect: ".into(),
            Self::Expert => concat!(
                "\nExpert menu\n",
                "  2 - Bollinger band strategy for a symbol\n",
                "  4 - Find good stocks\n",
                "  5 - Markowitz reference portfolios\n",
                "  6 - Gini reference portfolios\n",
                "  8 - Back\n",
                "Select: "
            )
            .into(),
            Self::BollingerSymbol => "Enter symbol: ".into(),
            Self::ViewProfile => "Enter user name: ".into(),
            Self::Questionnaire { step, .. } => match step {
                Step::Name => "Enter user name: ".into(),
                Step::MachineLearning => "Use machine learning? (0 - no, 1 - yes): ".into(),
                Step::Model => "Statistical model? (0 - Markowitz, 1 - Gini): ".into(),
                Step::Amount => format!("Investment amount [{DEFAULT_AMOUNT}]: "),
                Step::Risk(i) => format!("\n{}\nAnswer: ", RISK_QUESTIONS[(*i).min(RISK_QUESTIONS.len() - 1)]),
            },
            Self::Exit => String::new(),
        }
    }
}

pub fn transition(state: MenuState, input: &str) -> (MenuState, MenuAction) {
    let input = input.trim();
    match state {
        MenuState::Main => match input {
            "1" => (questionnaire(Step::Name, Draft::default()), MenuAction::None),
            "3" => (MenuState::ViewProfile, MenuAction::None),
            "4" => (MenuState::Expert, MenuAction::None),
            "8" => (MenuState::Exit, MenuAction::Quit),
            other => (MenuState::Main, invalid(format!("unknown option '{other}'"))),
        },
        MenuState::Expert => match input {
            "2" => (MenuState::BollingerSymbol, MenuAction::None),
            "4" => (MenuState::Expert, MenuAction::RankInstruments(StatModel::Markowitz)),
            "5" => (MenuState::Expert, MenuAction::ShowFrontier(StatModel::Markowitz)),
            "6" => (MenuState::Expert, MenuAction::ShowFrontier(StatModel::Gini)),
            "8" => (MenuState::Main, MenuAction::None),
            other => (MenuState::Expert, invalid(format!("unknown option '{other}'"))),
        },
        MenuState::BollingerSymbol => {
            if input.is_empty() {
                (MenuState::BollingerSymbol, invalid("symbol cannot be empty".into()))
            } else {
                (MenuState::Expert, MenuAction::ShowBollinger(input.to_uppercase()))
            }
        }
        MenuState::ViewProfile => {
            if input.is_empty() {
                (MenuState::ViewProfile, invalid("name cannot be empty".into()))
            } else {
                (MenuState::Main, MenuAction::ShowProfile(input.to_string()))
            }
        }
        MenuState::Questionnaire { step, draft } => answer(step, draft, input),
        MenuState::Exit => (MenuState::Exit, MenuAction::Quit),
    }
}

fn answer(step: Step, mut draft: Draft, input: &str) -> (MenuState, MenuAction) {
    match step {
        Step::Name => {
            if input.is_empty() {
                return (questionnaire(step, draft), invalid("name cannot be empty".into()));
            }
            draft.user_id = input.to_string();
            (questionnaire(Step::MachineLearning, draft), MenuAction::None)
        }
        Step::MachineLearning => match parse_in::<i64>(input, 0, 1) {
            Ok(ml) => {
                draft.ml_answer = ml;
                (questionnaire(Step::Model, draft), MenuAction::None)
            }
            Err(msg) => (questionnaire(step, draft), invalid(msg)),
        },
        Step::Model => {
            let prefs = parse_in::<i64>(input, 0, 1).and_then(|model| {
                AlgorithmPreferences::from_answers(draft.ml_answer, model).map_err(|e| e.user_message())
            });
            match prefs {
                Ok(prefs) => {
                    draft.preferences = prefs;
                    (questionnaire(Step::Amount, draft), MenuAction::None)
                }
                Err(msg) => (questionnaire(step, draft), invalid(msg)),
            }
        }
        Step::Amount => {
            let amount = if input.is_empty() {
                Ok(DEFAULT_AMOUNT)
            } else {
                Decimal::from_str(input).map_err(|_| format!("'{input}' is not an amount"))
            };
            match amount {
                Ok(amount) if amount != amount.round_dp(2) => {
                    (questionnaire(step, draft), invalid("amount can have at most 2 decimal places".into()))
                }
                Ok(amount) if amount > Decimal::ZERO => {
                    draft.amount = amount;
                    (questionnaire(Step::Risk(0), draft), MenuAction::None)
                }
                Ok(_) => (questionnaire(step, draft), invalid("amount must be positive".into())),
                Err(msg) => (questionnaire(step, draft), invalid(msg)),
            }
        }
        Step::Risk(i) => match parse_in::<i64>(input, MIN_ANSWER, MAX_ANSWER) {
            Ok(value) => {
                draft.answers.push(value);
                let model = draft.preferences.model;
                match i + 1 {
                    // questions 2 and 3 pick from the distributions and portfolios shown
                    1 => return (questionnaire(Step::Risk(1), draft), MenuAction::ShowDistribution(model)),
                    2 => return (questionnaire(Step::Risk(2), draft), MenuAction::ShowFrontier(model)),
                    _ => {}
                }
                let answers = match <[i64; 3]>::try_from(std::mem::take(&mut draft.answers)) {
                    Ok(answers) => answers,
                    Err(got) => {
                        return (
                            questionnaire(Step::Risk(0), draft),
                            invalid(format!("expected 3 risk answers, got {}; please answer again", got.len())),
                        );
                    }
                };
                let request = RecommendationRequest {
                    user_id: draft.user_id,
                    answers,
                    preferences: draft.preferences,
                    amount: draft.amount,
                };
                (MenuState::Main, MenuAction::Recommend(request))
            }
            Err(msg) => (questionnaire(step, draft), invalid(msg)),
        },
    }
}

fn questionnaire(step: Step, draft: Draft) -> MenuState {
    MenuState::Questionnaire { step, draft }
}

fn invalid(msg: String) -> MenuAction {
    MenuAction::Invalid(msg)
}

fn parse_in<T>(input: &str, min: T, max: T) -> Result<T, String>
where
    T: FromStr + PartialOrd + std::fmt::Display + Copy,
{
    match input.parse::<T>() {
        Ok(v) if v >= min && v <= max => Ok(v),
        _ => Err(format!("please enter a number from {min} to {max}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(inputs: &[&str]) -> (MenuState, Vec<MenuAction>) {
        let mut state = MenuState::Main;
        let mut actions = Vec::new();
        for input in inputs {
            let (next, action) = transition(state, input);
            state = next;
            actions.push(action);
        }
        (state, actions)
    }

    #[test]
    fn test_full_questionnaire() {
        let (state, actions) = feed(&["1", "alice", "1", "1", "2500.50", "3", "2", "3"]);
        assert_eq!(state, MenuState::Main);

        let MenuAction::Recommend(request) = actions.last().unwrap() else {
            panic!("expected a recommendation, got {actions:?}");
        };
        assert_eq!(request.user_id, "alice");
        assert_eq!(request.answers, [3, 2, 3]);
        assert!(request.preferences.use_machine_learning);
        assert_eq!(request.preferences.model, StatModel::Gini);
        assert_eq!(request.amount, dec!(2500.50));
    }

    #[test]
    fn test_default_amount() {
        let (_, actions) = feed(&["1", "bob", "0", "0", "", "1", "1", "1"]);
        let MenuAction::Recommend(request) = actions.last().unwrap() else {
            panic!("expected a recommendation");
        };
        assert_eq!(request.amount, DEFAULT_AMOUNT);
        assert_eq!(request.preferences, AlgorithmPreferences::default());
    }

    #[test]
    fn test_invalid_input_keeps_step() {
        let state = questionnaire(Step::Risk(1), Draft::default());
        for bad in ["0", "4", "x", ""] {
            let (next, action) = transition(state.clone(), bad);
            assert_eq!(next, state);
            assert!(matches!(action, MenuAction::Invalid(_)), "{bad}");
        }

        let state = questionnaire(Step::Model, Draft::default());
        let (next, action) = transition(state.clone(), "2");
        assert_eq!(next, state);
        assert!(matches!(action, MenuAction::Invalid(_)));

        let state = questionnaire(Step::Amount, Draft::default());
        for bad in ["-5", "0", "lots", "100.005"] {
            let (next, action) = transition(state.clone(), bad);
            assert_eq!(next, state);
            assert!(matches!(action, MenuAction::Invalid(_)), "{bad}");
        }
    }

    #[test]
    fn test_risk_questions_show_choices() {
        let (state, actions) = feed(&["1", "carol", "0", "1", "10", "2", "2"]);
        assert_eq!(actions[5], MenuAction::ShowDistribution(StatModel::Gini));
        assert_eq!(actions[6], MenuAction::ShowFrontier(StatModel::Gini));
        assert!(matches!(state, MenuState::Questionnaire { step: Step::Risk(2), .. }));
    }

    #[test]
    fn test_missing_answers_restart_risk_questions() {
        let draft = Draft {
            user_id: "dave".into(),
            answers: vec![2],
            ..Draft::default()
        };
        let (next, action) = transition(questionnaire(Step::Risk(2), draft), "3");
        assert!(matches!(action, MenuAction::Invalid(_)));
        let MenuState::Questionnaire { step, draft } = next else {
            panic!("expected the questionnaire, got {next:?}");
        };
        assert_eq!(step, Step::Risk(0));
        assert!(draft.answers.is_empty());
        assert_eq!(draft.user_id, "dave");

        // too many answers are rejected the same way
        let draft = Draft {
            answers: vec![1, 1, 1],
            ..Draft::default()
        };
        let (_, action) = transition(questionnaire(Step::Risk(2), draft), "1");
        assert!(matches!(action, MenuAction::Invalid(_)));
    }

    #[test]
    fn test_main_menu_routes() {
        assert_eq!(transition(MenuState::Main, "3").0, MenuState::ViewProfile);
        assert_eq!(transition(MenuState::Main, " 4 ").0, MenuState::Expert);
        assert_eq!(transition(MenuState::Main, "8"), (MenuState::Exit, MenuAction::Quit));

        let (next, action) = transition(MenuState::Main, "2");
        assert_eq!(next, MenuState::Main);
        assert!(matches!(action, MenuAction::Invalid(_)));
    }

    #[test]
    fn test_view_profile() {
        let (state, actions) = feed(&["3", "", "alice"]);
        assert_eq!(state, MenuState::Main);
        assert!(matches!(actions[1], MenuAction::Invalid(_)));
        assert_eq!(actions[2], MenuAction::ShowProfile("alice".into()));
    }

    #[test]
    fn test_expert_menu() {
        let (state, actions) = feed(&["4", "5", "6", "4", "9", "8"]);
        assert_eq!(state, MenuState::Main);
        assert_eq!(actions[1], MenuAction::ShowFrontier(StatModel::Markowitz));
        assert_eq!(actions[2], MenuAction::ShowFrontier(StatModel::Gini));
        assert_eq!(actions[3], MenuAction::RankInstruments(StatModel::Markowitz));
        assert!(matches!(actions[4], MenuAction::Invalid(_)));
    }

    #[test]
    fn test_expert_bollinger_asks_for_symbol() {
        let (state, actions) = feed(&["4", "2", " ", "tlt"]);
        assert_eq!(state, MenuState::Expert);
        assert_eq!(actions[1], MenuAction::None);
        assert!(matches!(actions[2], MenuAction::Invalid(_)));
        assert_eq!(actions[3], MenuAction::ShowBollinger("TLT".into()));
    }

    #[test]
    fn test_every_state_has_a_prompt() {
        assert!(MenuState::Main.prompt().contains("Exit"));
        assert!(MenuState::Expert.prompt().contains("Gini"));
        assert!(MenuState::Expert.prompt().contains("Bollinger"));
        assert!(MenuState::BollingerSymbol.prompt().contains("symbol"));
        for i in 0..3 {
            assert!(questionnaire(Step::Risk(i), Draft::default()).prompt().contains("Answer"));
        }
    }
}
