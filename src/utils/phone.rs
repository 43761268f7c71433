//! 电话号码校验模块
//!
//! 将用户输入规范化为 E.164 格式（`+` 加 7-15 位数字）

use serde::{Deserialize, Serialize};

/// E.164 最少位数（含国家码）
pub const MIN_DIGITS: usize = 7;
/// E.164 最多位数（含国家码）
pub const MAX_DIGITS: usize = 15;

/// 电话号码校验错误
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PhoneValidationError {
    Empty,
    InvalidCharacter(char),
    MissingCountryCode,
    TooShort(usize),
    TooLong(usize),
    InvalidCountryCode,
}

impl std::fmt::Display for PhoneValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty => write!(f, "Phone number cannot be empty"),
            Self::InvalidCharacter(c) => {
                write!(f, "Phone number contains invalid character '{}'", c)
            }
            Self::MissingCountryCode => write!(
                f,
                "Phone number must be in international format (e.g. +14155550123)"
            ),
            Self::TooShort(n) => write!(
                f,
                "Phone number has {} digits, at least {} required",
                n, MIN_DIGITS
            ),
            Self::TooLong(n) => write!(
                f,
                "Phone number has {} digits, at most {} allowed",
                n, MAX_DIGITS
            ),
            Self::InvalidCountryCode => write!(f, "Country code cannot start with 0"),
        }
    }
}

impl std::error::Error for PhoneValidationError {}

/// 已校验的 E.164 电话号码
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PhoneNumber(String);

impl PhoneNumber {
    /// 严格解析：输入必须已经带 `+` 国家码
    pub fn parse(raw: &str) -> Result<Self, PhoneValidationError> {
        normalize_phone(raw, None)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// 不含 `+` 的纯数字部分
    pub fn digits(&self) -> &str {
        &self.0[1..]
    }

    /// 脱敏显示，用于日志：+1415****123
    pub fn masked(&self) -> String {
        let digits = self.digits();
        if digits.len() <= 7 {
            return format!("+{}****", &digits[..digits.len().min(3)]);
        }
        let head = &digits[..4];
        let tail = &digits[digits.len() - 3..];
        format!("+{}****{}", head, tail)
    }
}

impl std::fmt::Display for PhoneNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for PhoneNumber {
    type Error = PhoneValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        PhoneNumber::parse(&value)
    }
}

impl From<PhoneNumber> for String {
    fn from(value: PhoneNumber) -> Self {
        value.0
    }
}

impl AsRef<str> for PhoneNumber {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// 规范化电话号码
///
/// 处理规则：
/// 1. 去除空格、`-`、`.`、`(`、`)` 等分隔符
/// 2. `00` 国际前缀转换为 `+`
/// 3. 无 `+` 时，若配置了默认国家码则补全（先去掉国内长途前缀 `0`）
/// 4. 校验位数和国家码
pub fn normalize_phone(
    raw: &str,
    default_country_code: Option<&str>,
) -> Result<PhoneNumber, PhoneValidationError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(PhoneValidationError::Empty);
    }

    let mut has_plus = false;
    let mut digits = String::with_capacity(raw.len());
    for (i, c) in raw.chars().enumerate() {
        match c {
            '+' if i == 0 => has_plus = true,
            '0'..='9' => digits.push(c),
            ' ' | '-' | '.' | '(' | ')' => {}
            other => return Err(PhoneValidationError::InvalidCharacter(other)),
        }
    }

    if digits.is_empty() {
        return Err(PhoneValidationError::Empty);
    }

    if !has_plus {
        if let Some(rest) = digits.strip_prefix("00") {
            digits = rest.to_string();
        } else {
            let cc = default_country_code
                .map(|cc| cc.trim().trim_start_matches('+'))
                .filter(|cc| !cc.is_empty())
                .ok_or(PhoneValidationError::MissingCountryCode)?;

            // 国内长途前缀 0 不属于 E.164 号码
            digits = format!("{}{}", cc, digits.trim_start_matches('0'));
        }
    }

    if digits.starts_with('0') {
        return Err(PhoneValidationError::InvalidCountryCode);
    }
    if digits.len() < MIN_DIGITS {
        return Err(PhoneValidationError::TooShort(digits.len()));
    }
    if digits.len() > MAX_DIGITS {
        return Err(PhoneValidationError::TooLong(digits.len()));
    }

    Ok(PhoneNumber(format!("+{}", digits)))
}
