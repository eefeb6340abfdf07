//! 电话号码规范化

use phonenumber::{Mode, country};

use idp_hooks_core::{ErrorBuilder, ErrorCode, Result};

/// 按国家代码解析号码并格式化为 E.164
pub fn to_e164(raw: &str, country_code: Option<&str>) -> Result<String> {
    let region = country_code
        .map(|code| code.trim().to_ascii_uppercase())
        .and_then(|code| code.parse::<country::Id>().ok());

    let number = phonenumber::parse(region, raw).map_err(|err| {
        ErrorBuilder::new(ErrorCode::DeserializationError, "invalid phone number")
            .details(err.to_string())
            .build_error()
    })?;
    if !phonenumber::is_valid(&number) {
        return Err(
            ErrorBuilder::new(ErrorCode::DeserializationError, "invalid phone number")
                .details(format!("raw={raw}"))
                .build_error(),
        );
    }
    Ok(number.format().mode(Mode::E164).to_string())
}
