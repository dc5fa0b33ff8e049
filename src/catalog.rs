//! Problem catalog and card factory
//!
//! The catalog is a static table of coding-problem templates; the factory
//! stamps single-use cards out of it. Process-wide immutable data: cards get
//! a clone of the problem, templates are never mutated.

use crate::types::{Card, Challenge, Difficulty, Problem, Reward, Signature, TestCase};
use rand::Rng;
use serde_json::json;

/// A catalog entry: the problem plus the reward/challenge descriptors a card
/// stamped from it will carry
#[derive(Debug, Clone)]
pub struct CardTemplate {
    pub problem: Problem,
    pub reward: Option<Reward>,
    pub challenge: Option<Challenge>,
}

/// Draws templates from the catalog and instantiates fresh cards
#[derive(Debug, Clone)]
pub struct CardFactory {
    templates: Vec<CardTemplate>,
}

impl CardFactory {
    pub fn new() -> Self {
        Self {
            templates: problem_templates(),
        }
    }

    /// Instantiate a single-use card from a uniformly drawn template
    pub fn draw(&self) -> Card {
        let mut rng = rand::rng();
        let template = &self.templates[rng.random_range(0..self.templates.len())];
        Card {
            id: ulid::Ulid::new().to_string(),
            problem: template.problem.clone(),
            reward: template.reward.clone(),
            challenge: template.challenge.clone(),
        }
    }

    /// Deal a fresh hand
    pub fn deal(&self, count: usize) -> Vec<Card> {
        (0..count).map(|_| self.draw()).collect()
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}

impl Default for CardFactory {
    fn default() -> Self {
        Self::new()
    }
}

fn signature(name: &str, params: &[&str]) -> Signature {
    Signature {
        name: name.to_string(),
        params: params.iter().map(|p| p.to_string()).collect(),
    }
}

fn case(input: serde_json::Value, expected: serde_json::Value) -> TestCase {
    TestCase {
        input,
        expected_output: expected,
    }
}

fn problem_templates() -> Vec<CardTemplate> {
    vec![
        CardTemplate {
            problem: Problem {
                title: "Two Sum".to_string(),
                description: "Given an array of integers nums and an integer target, return \
                              indices of the two numbers such that they add up to target."
                    .to_string(),
                difficulty: Difficulty::Easy,
                signature: signature("twoSum", &["nums", "target"]),
                test_cases: vec![
                    case(json!({"nums": [2, 7, 11, 15], "target": 9}), json!([0, 1])),
                    case(json!({"nums": [3, 2, 4], "target": 6}), json!([1, 2])),
                    case(json!({"nums": [3, 3], "target": 6}), json!([0, 1])),
                ],
            },
            reward: Some(Reward::AddTime { amount: 30 }),
            challenge: None,
        },
        CardTemplate {
            problem: Problem {
                title: "Valid Parentheses".to_string(),
                description: "Given a string s containing just the characters \"(\", \")\", \
                              \"{\", \"}\", \"[\" and \"]\", determine if the input string is \
                              valid."
                    .to_string(),
                difficulty: Difficulty::Easy,
                signature: signature("isValid", &["s"]),
                test_cases: vec![
                    case(json!({"s": "()"}), json!(true)),
                    case(json!({"s": "()[]{}"}), json!(true)),
                    case(json!({"s": "(]"}), json!(false)),
                ],
            },
            reward: Some(Reward::AddTime { amount: 25 }),
            challenge: Some(Challenge::TimeLimit { value: 120 }),
        },
        CardTemplate {
            problem: Problem {
                title: "Merge Two Sorted Lists".to_string(),
                description: "Merge two sorted linked lists and return it as a sorted list."
                    .to_string(),
                difficulty: Difficulty::Easy,
                signature: signature("mergeTwoLists", &["list1", "list2"]),
                test_cases: vec![
                    case(
                        json!({"list1": [1, 2, 4], "list2": [1, 3, 4]}),
                        json!([1, 1, 2, 3, 4, 4]),
                    ),
                    case(json!({"list1": [], "list2": []}), json!([])),
                ],
            },
            reward: Some(Reward::RemoveTimeRandom { amount: 20 }),
            challenge: None,
        },
        CardTemplate {
            problem: Problem {
                title: "Longest Palindromic Substring".to_string(),
                description: "Given a string s, return the longest palindromic substring in s."
                    .to_string(),
                difficulty: Difficulty::Medium,
                signature: signature("longestPalindrome", &["s"]),
                test_cases: vec![
                    case(json!({"s": "babad"}), json!("bab")),
                    case(json!({"s": "cbbd"}), json!("bb")),
                ],
            },
            reward: Some(Reward::AddTime { amount: 45 }),
            challenge: Some(Challenge::Complexity {
                value: "O(n)".to_string(),
            }),
        },
        CardTemplate {
            problem: Problem {
                title: "Container With Most Water".to_string(),
                description: "Find two lines that together with the x-axis forms a container, \
                              such that the container contains the most water."
                    .to_string(),
                difficulty: Difficulty::Medium,
                signature: signature("maxArea", &["height"]),
                test_cases: vec![
                    case(json!({"height": [1, 8, 6, 2, 5, 4, 8, 3, 7]}), json!(49)),
                    case(json!({"height": [1, 1]}), json!(1)),
                ],
            },
            reward: Some(Reward::RemoveTimeAll { amount: 30 }),
            challenge: None,
        },
        CardTemplate {
            problem: Problem {
                title: "3Sum".to_string(),
                description: "Find all triplets in the array which gives the sum of zero."
                    .to_string(),
                difficulty: Difficulty::Medium,
                signature: signature("threeSum", &["nums"]),
                test_cases: vec![
                    case(
                        json!({"nums": [-1, 0, 1, 2, -1, -4]}),
                        json!([[-1, -1, 2], [-1, 0, 1]]),
                    ),
                    case(json!({"nums": []}), json!([])),
                ],
            },
            reward: Some(Reward::RemoveTimeTargeted { amount: 50 }),
            challenge: Some(Challenge::LineLimit { value: 30 }),
        },
        CardTemplate {
            problem: Problem {
                title: "Trapping Rain Water".to_string(),
                description: "Given n non-negative integers representing an elevation map, \
                              compute how much water it can trap after raining."
                    .to_string(),
                difficulty: Difficulty::Hard,
                signature: signature("trap", &["height"]),
                test_cases: vec![
                    case(
                        json!({"height": [0, 1, 0, 2, 1, 0, 1, 3, 2, 1, 2, 1]}),
                        json!(6),
                    ),
                    case(json!({"height": [4, 2, 0, 3, 2, 5]}), json!(9)),
                ],
            },
            reward: Some(Reward::AddTime { amount: 60 }),
            challenge: None,
        },
        CardTemplate {
            problem: Problem {
                title: "Longest Increasing Subsequence".to_string(),
                description: "Find the length of the longest strictly increasing subsequence."
                    .to_string(),
                difficulty: Difficulty::Hard,
                signature: signature("lengthOfLIS", &["nums"]),
                test_cases: vec![
                    case(json!({"nums": [10, 9, 2, 5, 3, 7, 101, 18]}), json!(4)),
                    case(json!({"nums": [0, 1, 0, 3, 2, 3]}), json!(4)),
                ],
            },
            reward: Some(Reward::AddTime { amount: 45 }),
            challenge: Some(Challenge::TimeLimit { value: 180 }),
        },
        CardTemplate {
            problem: Problem {
                title: "Binary Search".to_string(),
                description: "Given a sorted array of integers and a target value, return the \
                              index of the target if found, otherwise return -1."
                    .to_string(),
                difficulty: Difficulty::Medium,
                signature: signature("binarySearch", &["nums", "target"]),
                test_cases: vec![
                    case(json!({"nums": [-1, 0, 3, 5, 9, 12], "target": 9}), json!(4)),
                    case(json!({"nums": [-1, 0, 3, 5, 9, 12], "target": 2}), json!(-1)),
                    case(json!({"nums": [5], "target": 5}), json!(0)),
                ],
            },
            reward: Some(Reward::FlashbangTargeted),
            challenge: None,
        },
    ]
}
