use std::{collections::HashMap, sync::LazyLock};

use crate::types::Locale;

pub const FALLBACK_MESSAGE_EN: &str = "An error occurred, please try again";
pub const FALLBACK_MESSAGE_VI: &str = "Có lỗi xảy ra, xin vui lòng thử lại";

pub const NOT_FOUND_MESSAGE_EN: &str = "No matching response code found";
pub const NOT_FOUND_MESSAGE_VI: &str = "Không tìm thấy mã lỗi thích hợp";

/// Gateway response code to (English, Vietnamese) message.
///
/// Only the success code and the catch-all failure code are listed; every
/// other code resolves to the not-found message.
// TODO: add the remaining codes once the gateway's published code list is available.
static RESPONSE_MESSAGES: LazyLock<HashMap<&'static str, (&'static str, &'static str)>> =
    LazyLock::new(|| {
        HashMap::from([
            ("000", ("Transaction successful", "Giao dịch thành công")),
            ("500", (FALLBACK_MESSAGE_EN, FALLBACK_MESSAGE_VI)),
        ])
    });

/// Static lookup from gateway response codes to readable messages.
pub struct ResponseCodeTable;

impl ResponseCodeTable {
    /// Message for `code`, or the "not found" message when the code is unknown.
    ///
    /// Surrounding whitespace is ignored and short numeric codes are matched in
    /// their zero-padded form, so `"0"` and `" 000 "` both find `"000"`.
    pub fn message(code: &str, locale: Locale) -> &'static str {
        let code = code.trim();
        let entry = RESPONSE_MESSAGES.get(code).or_else(|| {
            code.parse::<u16>()
                .ok()
                .and_then(|numeric| RESPONSE_MESSAGES.get(format!("{numeric:03}").as_str()))
        });

        match (entry, locale) {
            (Some(&(english, _)), Locale::En) => english,
            (Some(&(_, vietnamese)), Locale::Vi) => vietnamese,
            (None, locale) => Self::not_found_message(locale),
        }
    }

    pub fn not_found_message(locale: Locale) -> &'static str {
        match locale {
            Locale::En => NOT_FOUND_MESSAGE_EN,
            Locale::Vi => NOT_FOUND_MESSAGE_VI,
        }
    }

    pub fn fallback_message(locale: Locale) -> &'static str {
        match locale {
            Locale::En => FALLBACK_MESSAGE_EN,
            Locale::Vi => FALLBACK_MESSAGE_VI,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_code_resolves_in_both_locales() {
        assert_eq!(
            ResponseCodeTable::message("000", Locale::En),
            "Transaction successful"
        );
        assert_eq!(
            ResponseCodeTable::message("000", Locale::Vi),
            "Giao dịch thành công"
        );
    }

    #[test]
    fn codes_are_normalised_before_lookup() {
        assert_eq!(
            ResponseCodeTable::message(" 000 ", Locale::En),
            "Transaction successful"
        );
        assert_eq!(ResponseCodeTable::message("0", Locale::En), "Transaction successful");
        assert_eq!(ResponseCodeTable::message("500", Locale::En), FALLBACK_MESSAGE_EN);
    }

    #[test]
    fn unknown_code_resolves_to_not_found_message() {
        assert_eq!(
            ResponseCodeTable::message("99999", Locale::En),
            NOT_FOUND_MESSAGE_EN
        );
        assert_eq!(ResponseCodeTable::message("", Locale::Vi), NOT_FOUND_MESSAGE_VI);
        assert_eq!(ResponseCodeTable::message("ABC", Locale::En), NOT_FOUND_MESSAGE_EN);
        assert_eq!(ResponseCodeTable::message("005", Locale::En), NOT_FOUND_MESSAGE_EN);
    }
}
