//! Flashcards derived from the aggregated session.
//!
//! One card per question (stem on the front, correct answer and explanation
//! on the back) and one per mnemonic (topic on the front, device and what it
//! stands for on the back). No generator calls.

use super::aggregate::AggregatedSession;
use crate::artifacts::{Flashcard, FlashcardDeck, FlashcardSource};

pub fn build(session: &AggregatedSession) -> FlashcardDeck {
    let question_cards = session.questions.questions.iter().filter_map(|q| {
        let answer = q.correct_option()?;
        let back = if q.explanation.is_empty() {
            answer.text.clone()
        } else {
            format!("{}\n\n{}", answer.text, q.explanation)
        };
        Some((q.text.clone(), back, FlashcardSource::Question(q.id.clone())))
    });

    let mnemonic_cards = session.mnemonics.mnemonics.iter().map(|m| {
        let front = if m.topic.is_empty() {
            format!("Mnemonic: {}", m.device)
        } else {
            format!("Mnemonic for {}", m.topic)
        };
        let back = if m.explanation.is_empty() {
            m.device.clone()
        } else {
            format!("{}\n\n{}", m.device, m.explanation)
        };
        (front, back, FlashcardSource::Mnemonic(m.id.clone()))
    });

    FlashcardDeck {
        cards: question_cards
            .chain(mnemonic_cards)
            .enumerate()
            .map(|(i, (front, back, source))| Flashcard {
                id: format!("f-{:04}", i + 1),
                front,
                back,
                source,
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BatchResult, Difficulty, MnemonicDraft, OptionDraft, QuestionDraft};
    use crate::pipeline::aggregate::aggregate;

    #[test]
    fn one_card_per_question_and_mnemonic() {
        let result = BatchResult {
            batch_id: "batch-000".into(),
            ordinal: 0,
            questions: vec![QuestionDraft {
                text: "Which valve is bicuspid?".into(),
                options: vec![OptionDraft::new("Tricuspid", false), OptionDraft::new("Mitral", true)],
                explanation: "It has two cusps.".into(),
                difficulty: Difficulty::Easy,
                subject: "Cardiology".into(),
            }],
            mnemonics: vec![MnemonicDraft {
                topic: "Heart valves".into(),
                device: "Try Pulling My Aorta".into(),
                explanation: String::new(),
            }],
            cheat_points: vec!["point".into()],
            key_concepts: vec![],
        };
        let deck = build(&aggregate(vec![result], []));
        assert_eq!(deck.len(), 2);

        let card = &deck.cards[0];
        assert_eq!(card.id, "f-0001");
        assert_eq!(card.front, "Which valve is bicuspid?");
        assert_eq!(card.back, "Mitral\n\nIt has two cusps.");
        assert_eq!(card.source, FlashcardSource::Question("q-0001".into()));

        let card = &deck.cards[1];
        assert_eq!(card.front, "Mnemonic for Heart valves");
        assert_eq!(card.back, "Try Pulling My Aorta");
        assert_eq!(card.source, FlashcardSource::Mnemonic("m-0001".into()));
    }

    #[test]
    fn empty_session_gives_empty_deck() {
        assert!(build(&AggregatedSession::default()).is_empty());
    }
}
