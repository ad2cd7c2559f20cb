use std::sync::Arc;

use super::catalog::ReplyCatalog;
use super::random::RandomSource;

/// What kind of assistant reply to produce for one user input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyDirective {
    Text { text: String },
    Card { card_id: String },
}

/// Keyword predicate over lower-cased input.
#[derive(Debug, Clone, Copy)]
enum Matcher {
    Any(&'static [&'static str]),
    /// `keyword` must appear together with at least one of `any`.
    KeywordWithAny {
        keyword: &'static str,
        any: &'static [&'static str],
    },
}

impl Matcher {
    fn matches(self, text: &str) -> bool {
        match self {
            Self::Any(needles) => needles.iter().any(|needle| text.contains(needle)),
            Self::KeywordWithAny { keyword, any } => {
                text.contains(keyword) && any.iter().any(|needle| text.contains(needle))
            }
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Outcome {
    Canned(usize),
    RandomCard,
}

#[derive(Debug, Clone, Copy)]
struct Rule {
    matcher: Matcher,
    outcome: Outcome,
}

// Evaluated top to bottom; the first match wins.
const RULES: [Rule; 6] = [
    Rule {
        matcher: Matcher::Any(&["hello", "你好", "hi"]),
        outcome: Outcome::Canned(0),
    },
    Rule {
        matcher: Matcher::KeywordWithAny {
            keyword: "介绍",
            any: &["你自己", "你是谁"],
        },
        outcome: Outcome::Canned(1),
    },
    Rule {
        matcher: Matcher::Any(&["冒泡"]),
        outcome: Outcome::Canned(2),
    },
    Rule {
        matcher: Matcher::Any(&["天气"]),
        outcome: Outcome::Canned(3),
    },
    Rule {
        matcher: Matcher::Any(&["脚本"]),
        outcome: Outcome::Canned(4),
    },
    Rule {
        matcher: Matcher::KeywordWithAny {
            keyword: "介绍",
            any: &["歌手", "乐队", "你喜欢"],
        },
        outcome: Outcome::RandomCard,
    },
];

/// Case-insensitive keyword classifier mapping user input to a reply directive.
#[derive(Debug, Clone)]
pub struct ReplyRules {
    catalog: Arc<ReplyCatalog>,
}

impl ReplyRules {
    pub fn new(catalog: Arc<ReplyCatalog>) -> Self {
        Self { catalog }
    }

    pub fn catalog(&self) -> &ReplyCatalog {
        &self.catalog
    }

    pub fn classify(&self, input: &str, random: &mut dyn RandomSource) -> ReplyDirective {
        let text = input.to_lowercase();
        let Some(rule) = RULES.iter().find(|rule| rule.matcher.matches(&text)) else {
            return ReplyDirective::Text {
                text: self.catalog.fallback.clone(),
            };
        };

        match rule.outcome {
            Outcome::Canned(index) => ReplyDirective::Text {
                text: self.catalog.canned_reply(index).to_string(),
            },
            Outcome::RandomCard => {
                let cards = &self.catalog.cards;
                let card = &cards[random.pick_index(cards.len())];
                ReplyDirective::Card {
                    card_id: card.id.clone(),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedRandom(usize);

    impl RandomSource for FixedRandom {
        fn pick_index(&mut self, upper: usize) -> usize {
            self.0 % upper
        }
    }

    fn rules() -> ReplyRules {
        ReplyRules::new(Arc::new(ReplyCatalog::builtin().unwrap()))
    }

    fn canned(rules: &ReplyRules, index: usize) -> ReplyDirective {
        ReplyDirective::Text {
            text: rules.catalog().canned_reply(index).to_string(),
        }
    }

    fn classify(rules: &ReplyRules, input: &str) -> ReplyDirective {
        rules.classify(input, &mut FixedRandom(0))
    }

    #[test]
    fn greetings_match_first_rule_case_insensitively() {
        let rules = rules();
        assert_eq!(classify(&rules, "hello"), canned(&rules, 0));
        assert_eq!(classify(&rules, "HeLLo there"), canned(&rules, 0));
        assert_eq!(classify(&rules, "你好呀"), canned(&rules, 0));
        assert_eq!(classify(&rules, "Hi"), canned(&rules, 0));
    }

    #[test]
    fn keyword_rules_map_to_their_replies() {
        let rules = rules();
        assert_eq!(classify(&rules, "介绍一下你自己"), canned(&rules, 1));
        assert_eq!(classify(&rules, "请介绍你是谁"), canned(&rules, 1));
        assert_eq!(classify(&rules, "写个冒泡排序"), canned(&rules, 2));
        assert_eq!(classify(&rules, "今天天气怎么样"), canned(&rules, 3));
        assert_eq!(classify(&rules, "来一个脚本"), canned(&rules, 4));
    }

    #[test]
    fn first_match_wins_over_card_rule() {
        let rules = rules();
        assert_eq!(classify(&rules, "你好，能否介绍一下歌手"), canned(&rules, 0));
    }

    #[test]
    fn introduction_alone_is_not_enough() {
        let rules = rules();
        assert_eq!(
            classify(&rules, "介绍一下"),
            ReplyDirective::Text {
                text: rules.catalog().fallback.clone(),
            }
        );
    }

    #[test]
    fn music_introductions_pick_a_card() {
        let rules = rules();
        for (index, expected) in ["card1", "card2", "card3"].iter().enumerate() {
            let directive = rules.classify("介绍一下乐队", &mut FixedRandom(index));
            assert_eq!(
                directive,
                ReplyDirective::Card {
                    card_id: expected.to_string(),
                }
            );
        }
        assert!(matches!(
            classify(&rules, "介绍一下你喜欢的歌手"),
            ReplyDirective::Card { .. }
        ));
    }

    #[test]
    fn unknown_input_gets_the_apology() {
        let rules = rules();
        assert_eq!(
            classify(&rules, "量子力学"),
            ReplyDirective::Text {
                text: "抱歉，我不太明白你的意思".to_string(),
            }
        );
    }
}
