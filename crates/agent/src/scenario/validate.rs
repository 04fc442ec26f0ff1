//! Step input validation
//!
//! Each input type turns the trimmed raw input into a JSON value or a
//! Korean error message shown to the customer.

use chrono::NaiveDate;
use regex::Regex;
use serde_json::Value;
use unicode_segmentation::UnicodeSegmentation;

use contact_center_core::{InputType, Step, ValidationRules};

const DEFAULT_MIN_LENGTH: usize = 1;
const DEFAULT_MAX_LENGTH: usize = 1000;
const DEFAULT_DATE_FORMAT: &str = "%Y-%m-%d";

const YES_WORDS: &[&str] = &["예", "네", "응", "yes", "y", "확인", "맞아요", "좋아요"];
const NO_WORDS: &[&str] = &["아니요", "아니오", "아니", "no", "n", "취소"];

pub type Validation = Result<Value, String>;

/// Validate `input` for `step`. `today` is the current date in the
/// session's timezone.
pub fn validate_input(step: &Step, input: &str, today: NaiveDate) -> Validation {
    let input = input.trim();
    let rules = &step.validation_rules;
    match step.input_type {
        InputType::Choice | InputType::Selection => validate_choice(rules, input),
        InputType::Text | InputType::SecureText | InputType::Form | InputType::FileUpload => {
            validate_text(rules, input)
        },
        InputType::Date => validate_date(rules, input, today),
        InputType::Number => validate_number(rules, input),
        InputType::Confirmation => validate_confirmation(input),
        InputType::Display => Ok(Value::Null),
    }
}

/// String form of a validated value, used to pick the successor
pub fn value_key(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        Value::Number(n) => match n.as_f64() {
            Some(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{f:.1}"),
            _ => n.to_string(),
        },
        other => other.to_string(),
    }
}

fn validate_choice(rules: &ValidationRules, input: &str) -> Validation {
    if rules.choices.iter().any(|c| c == input) {
        Ok(Value::String(input.to_string()))
    } else {
        Err(format!(
            "올바른 선택지를 입력해주세요: {}",
            rules.choices.join(", ")
        ))
    }
}

fn validate_text(rules: &ValidationRules, input: &str) -> Validation {
    let length = input.graphemes(true).count();
    let min = rules.min_length.unwrap_or(DEFAULT_MIN_LENGTH);
    let max = rules.max_length.unwrap_or(DEFAULT_MAX_LENGTH);

    if length < min {
        return Err(format!("최소 {min}글자 이상 입력해주세요."));
    }
    if length > max {
        return Err(format!("최대 {max}글자까지 입력 가능합니다."));
    }

    if let Some(pattern) = &rules.pattern {
        let pattern_error = || {
            rules
                .error_message
                .clone()
                .unwrap_or_else(|| "올바른 형식으로 입력해주세요.".to_string())
        };
        // Anchored at the start only
        let re = Regex::new(&format!("^(?:{pattern})")).map_err(|e| {
            tracing::warn!(pattern = %pattern, error = %e, "Invalid step pattern");
            pattern_error()
        })?;
        if !re.is_match(input) {
            return Err(pattern_error());
        }
    }

    Ok(Value::String(input.to_string()))
}

/// Accept chrono formats as-is and translate `YYYY-MM-DD` style ones
fn chrono_format(format: &str) -> String {
    if format.contains('%') {
        return format.to_string();
    }
    format
        .replace("YYYY", "%Y")
        .replace("MM", "%m")
        .replace("DD", "%d")
}

fn validate_date(rules: &ValidationRules, input: &str, today: NaiveDate) -> Validation {
    let format = rules
        .date_format
        .as_deref()
        .map(chrono_format)
        .unwrap_or_else(|| DEFAULT_DATE_FORMAT.to_string());

    let date = NaiveDate::parse_from_str(input, &format)
        .map_err(|_| "올바른 날짜 형식으로 입력해주세요. (예: 2024-01-15)".to_string())?;

    if rules.future_only && date <= today {
        return Err("오늘 이후의 날짜를 입력해주세요.".to_string());
    }
    Ok(Value::String(date.format(&format).to_string()))
}

fn validate_number(rules: &ValidationRules, input: &str) -> Validation {
    let number: f64 = input
        .replace(',', "")
        .parse()
        .ok()
        .filter(|n: &f64| n.is_finite())
        .ok_or_else(|| "올바른 숫자를 입력해주세요.".to_string())?;

    if let Some(min) = rules.min_value {
        if number < min {
            return Err(format!("{min} 이상의 값을 입력해주세요."));
        }
    }
    if let Some(max) = rules.max_value {
        if number > max {
            return Err(format!("{max} 이하의 값을 입력해주세요."));
        }
    }
    serde_json::Number::from_f64(number)
        .map(Value::Number)
        .ok_or_else(|| "올바른 숫자를 입력해주세요.".to_string())
}

fn validate_confirmation(input: &str) -> Validation {
    let lowered = input.to_lowercase();
    if YES_WORDS.contains(&lowered.as_str()) {
        Ok(Value::String("yes".to_string()))
    } else if NO_WORDS.contains(&lowered.as_str()) {
        Ok(Value::String("no".to_string()))
    } else {
        Err("예 또는 아니요로 답변해주세요.".to_string())
    }
}
