pub mod answer;
pub mod question;
pub mod quiz;
pub mod user;

pub use answer::{NewUserAnswer, SelectedOption, UserAnswer};
pub use question::{NewQuestion, Question, QuestionKind, QuestionType, VariableAnswer};
pub use quiz::{NewQuiz, Quiz, QuizStatus};
pub use user::{NewUser, Role, User};
