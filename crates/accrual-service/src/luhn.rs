//! 订单号 Luhn 校验
//!
//! 纯函数，供订单入库前校验使用，Worker 不依赖它。

/// 校验数字串是否满足 Luhn 算法
///
/// 从右向左扫描（最右位下标为 0），奇数下标位乘 2，结果大于 9 时减 9，
/// 全部位求和后能被 10 整除即为合法。空串或包含非 ASCII 数字字符时返回 false。
pub fn validate(number: &str) -> bool {
    if number.is_empty() {
        return false;
    }

    let mut sum: u32 = 0;
    for (idx, byte) in number.bytes().rev().enumerate() {
        if !byte.is_ascii_digit() {
            return false;
        }
        let mut digit = u32::from(byte - b'0');
        if idx % 2 == 1 {
            digit *= 2;
            if digit > 9 {
                digit -= 9;
            }
        }
        sum += digit;
    }

    sum % 10 == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_vectors() {
        assert!(validate("4561261212345467"));
        assert!(!validate("4561261212345464"));
        assert!(validate("0"));
        assert!(validate("12345678903"));
        assert!(validate("79927398713"));
    }

    #[test]
    fn test_empty_is_invalid() {
        assert!(!validate(""));
    }

    #[test]
    fn test_non_digit_is_invalid() {
        assert!(!validate("1234-5678-903"));
        assert!(!validate("12345678903 "));
        assert!(!validate("abc"));
        // 全角数字不是 ASCII 数字
        assert!(!validate("１２３"));
    }

    #[test]
    fn test_single_digit_error_detected() {
        // 修改任意一位都会破坏校验和
        let valid = "12345678903";
        for pos in 0..valid.len() {
            let mut bytes = valid.as_bytes().to_vec();
            bytes[pos] = if bytes[pos] == b'9' { b'0' } else { bytes[pos] + 1 };
            let mutated = String::from_utf8(bytes).unwrap();
            assert!(!validate(&mutated), "mutation at {} should fail: {}", pos, mutated);
        }
    }

    #[test]
    fn test_input_is_not_mutated() {
        let number = String::from("4561261212345467");
        let copy = number.clone();
        let _ = validate(&number);
        assert_eq!(number, copy);
    }
}
