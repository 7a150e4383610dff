//! Question pools and difficulty tiers

use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Challenge difficulty tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    #[default]
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    pub const ALL: [Difficulty; 3] = [Difficulty::Easy, Difficulty::Medium, Difficulty::Hard];

    /// Tier for the number of challenges already resolved this session
    pub fn for_answered(questions_answered: u32) -> Self {
        match questions_answered {
            0..=2 => Difficulty::Easy,
            3..=5 => Difficulty::Medium,
            _ => Difficulty::Hard,
        }
    }

    /// Countdown budget in seconds
    pub fn time_budget_secs(&self) -> u32 {
        match self {
            Difficulty::Easy => 10,
            Difficulty::Medium => 15,
            Difficulty::Hard => 25,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }
}

/// Number of answer options per question
pub const OPTION_COUNT: usize = 4;

/// An immutable multiple-choice question
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub prompt: String,
    pub options: [String; OPTION_COUNT],
    pub correct_index: usize,
}

impl Question {
    pub fn new(prompt: &str, options: [&str; OPTION_COUNT], correct_index: usize) -> Self {
        Self {
            prompt: prompt.to_string(),
            options: options.map(str::to_string),
            correct_index,
        }
    }

    pub fn correct_option(&self) -> &str {
        &self.options[self.correct_index]
    }
}

#[derive(Debug, Error)]
pub enum BankError {
    #[error("question bank is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("the {0:?} pool has no questions")]
    EmptyPool(Difficulty),
    #[error("{difficulty:?} question {position} has correct index {index} (must be below 4)")]
    BadAnswerIndex {
        difficulty: Difficulty,
        position: usize,
        index: usize,
    },
}

/// The three fixed pools, one per difficulty.
///
/// Every constructor validates, so each pool is non-empty and every answer
/// index is in range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Pools")]
pub struct QuestionBank {
    easy: Vec<Question>,
    medium: Vec<Question>,
    hard: Vec<Question>,
}

/// Unvalidated wire form of a bank
#[derive(Deserialize)]
struct Pools {
    easy: Vec<Question>,
    medium: Vec<Question>,
    hard: Vec<Question>,
}

impl TryFrom<Pools> for QuestionBank {
    type Error = BankError;

    fn try_from(pools: Pools) -> Result<Self, Self::Error> {
        Self::new(pools.easy, pools.medium, pools.hard)
    }
}

impl Default for QuestionBank {
    fn default() -> Self {
        Self::builtin()
    }
}

impl QuestionBank {
    pub fn new(
        easy: Vec<Question>,
        medium: Vec<Question>,
        hard: Vec<Question>,
    ) -> Result<Self, BankError> {
        let bank = Self { easy, medium, hard };
        bank.validate()?;
        Ok(bank)
    }

    pub fn pool(&self, difficulty: Difficulty) -> &[Question] {
        match difficulty {
            Difficulty::Easy => &self.easy,
            Difficulty::Medium => &self.medium,
            Difficulty::Hard => &self.hard,
        }
    }

    /// Uniform draw with replacement; repeats across rounds are allowed
    pub fn draw<R: Rng + ?Sized>(&self, difficulty: Difficulty, rng: &mut R) -> Question {
        let pool = self.pool(difficulty);
        pool[rng.random_range(0..pool.len())].clone()
    }

    /// Parse and validate a bank from JSON
    pub fn from_json(json: &str) -> Result<Self, BankError> {
        let pools: Pools = serde_json::from_str(json)?;
        pools.try_into()
    }

    fn validate(&self) -> Result<(), BankError> {
        for difficulty in Difficulty::ALL {
            let pool = self.pool(difficulty);
            if pool.is_empty() {
                return Err(BankError::EmptyPool(difficulty));
            }
            if let Some((position, q)) = pool
                .iter()
                .enumerate()
                .find(|(_, q)| q.correct_index >= OPTION_COUNT)
            {
                return Err(BankError::BadAnswerIndex {
                    difficulty,
                    position,
                    index: q.correct_index,
                });
            }
        }
        Ok(())
    }

    /// The stock general-knowledge bank, ten questions per tier
    pub fn builtin() -> Self {
        Self {
            easy: vec![
                Question::new("What is 2 + 2?", ["3", "4", "5", "6"], 1),
                Question::new(
                    "What color do you get mixing red and blue?",
                    ["Green", "Orange", "Purple", "Yellow"],
                    2,
                ),
                Question::new("How many days in a week?", ["5", "6", "7", "8"], 2),
                Question::new(
                    "What is the largest planet in our solar system?",
                    ["Saturn", "Neptune", "Earth", "Jupiter"],
                    3,
                ),
                Question::new(
                    "What is the chemical symbol for water?",
                    ["WO", "H2O", "HO2", "W2O"],
                    1,
                ),
                Question::new("How many legs does a spider have?", ["6", "8", "10", "4"], 1),
                Question::new(
                    "Which animal is known as the 'King of the Jungle'?",
                    ["Tiger", "Bear", "Lion", "Elephant"],
                    2,
                ),
                Question::new(
                    "What is the smallest continent?",
                    ["Africa", "Europe", "Australia", "Asia"],
                    2,
                ),
                Question::new("How many months have 30 days?", ["3", "4", "5", "6"], 3),
                Question::new(
                    "What is the boiling point of water in °C?",
                    ["50", "75", "90", "100"],
                    3,
                ),
            ],
            medium: vec![
                Question::new("What is the square root of 144?", ["10", "11", "12", "13"], 2),
                Question::new(
                    "Which element has the atomic number 1?",
                    ["Helium", "Oxygen", "Hydrogen", "Carbon"],
                    2,
                ),
                Question::new(
                    "What is the longest river in the world?",
                    ["Amazon", "Nile", "Yangtze", "Congo"],
                    1,
                ),
                Question::new(
                    "In what year did World War II end?",
                    ["1943", "1944", "1945", "1946"],
                    2,
                ),
                Question::new(
                    "What is the powerhouse of the cell?",
                    ["Nucleus", "Ribosome", "Mitochondria", "Golgi body"],
                    2,
                ),
                Question::new(
                    "Which gas makes up most of Earth's atmosphere?",
                    ["Oxygen", "Carbon Dioxide", "Nitrogen", "Hydrogen"],
                    2,
                ),
                Question::new(
                    "What is the speed of light (approx.) in km/s?",
                    ["150,000", "200,000", "300,000", "400,000"],
                    2,
                ),
                Question::new(
                    "Who painted the Mona Lisa?",
                    ["Michelangelo", "Da Vinci", "Raphael", "Donatello"],
                    1,
                ),
                Question::new(
                    "What is the chemical symbol for gold?",
                    ["Go", "Gd", "Au", "Ag"],
                    2,
                ),
                Question::new(
                    "How many bones does the adult human body have?",
                    ["196", "206", "216", "226"],
                    1,
                ),
            ],
            hard: vec![
                Question::new("What is the derivative of ln(x)?", ["x", "1/x", "ln(x)", "0"], 1),
                Question::new(
                    "Which subatomic particle has no charge?",
                    ["Proton", "Electron", "Quark", "Neutron"],
                    3,
                ),
                Question::new(
                    "What is the half-life of Carbon-14 (approx)?",
                    ["1,500 yrs", "3,500 yrs", "5,730 yrs", "8,000 yrs"],
                    2,
                ),
                Question::new(
                    "In what language was the original Bible written?",
                    ["Latin", "Greek", "Aramaic", "Hebrew & Aramaic"],
                    3,
                ),
                Question::new(
                    "What is the molar mass of CO₂ (g/mol)?",
                    ["28", "32", "40", "44"],
                    3,
                ),
                Question::new(
                    "Which treaty ended WWI?",
                    [
                        "Treaty of Paris",
                        "Treaty of Versailles",
                        "Treaty of Vienna",
                        "Treaty of Ghent",
                    ],
                    1,
                ),
                Question::new(
                    "What is Avogadro's number (approx)?",
                    ["6.02×10²¹", "6.02×10²²", "6.02×10²³", "6.02×10²⁴"],
                    2,
                ),
                Question::new(
                    "Which organ produces insulin?",
                    ["Liver", "Kidney", "Pancreas", "Stomach"],
                    2,
                ),
                Question::new(
                    "What is the longest bone in the human body?",
                    ["Tibia", "Humerus", "Fibula", "Femur"],
                    3,
                ),
                Question::new(
                    "In quantum mechanics, what does 'H' represent in Schrödinger's equation?",
                    ["Heat", "Hamiltonian", "Humidity", "Harmonic"],
                    1,
                ),
            ],
        }
    }
}
