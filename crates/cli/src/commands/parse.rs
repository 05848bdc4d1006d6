use amanah_core::money::format_rupiah;
use amanah_core::parsers::{
    classify_confirmation, is_cancel, normalize_phone, parse_amount, Confirmation,
};
use clap::ValueEnum;
use serde::Serialize;

use super::CommandResult;

const COMMAND: &str = "parse";
const UNPARSEABLE_EXIT_CODE: u8 = 3;

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ParserKind {
    Amount,
    Confirmation,
    Phone,
}

#[derive(Debug, Serialize)]
struct AmountResult<'a> {
    input: &'a str,
    amount: i64,
    formatted: String,
}

#[derive(Debug, Serialize)]
struct ConfirmationResult<'a> {
    input: &'a str,
    answer: &'static str,
    cancel: bool,
}

#[derive(Debug, Serialize)]
struct PhoneResult<'a> {
    input: &'a str,
    normalized: String,
}

pub fn run(parser: ParserKind, input: &str) -> CommandResult {
    match parser {
        ParserKind::Amount => match parse_amount(input) {
            Ok(amount) => {
                let formatted = format_rupiah(amount);
                let message = format!("`{input}` parses to {formatted}");
                CommandResult::success(COMMAND, AmountResult { input, amount, formatted }, message)
            }
            Err(error) => unparseable(format!("`{input}`: {error}")),
        },
        ParserKind::Confirmation => {
            let answer = match classify_confirmation(input) {
                Confirmation::Yes => "yes",
                Confirmation::No => "no",
                Confirmation::Unrecognized => "unrecognized",
            };
            let cancel = is_cancel(input);
            let message = format!("`{input}` reads as {answer}");
            CommandResult::success(COMMAND, ConfirmationResult { input, answer, cancel }, message)
        }
        ParserKind::Phone => match normalize_phone(input) {
            Some(normalized) => {
                let message = format!("`{input}` normalizes to {normalized}");
                CommandResult::success(COMMAND, PhoneResult { input, normalized }, message)
            }
            None => unparseable(format!("`{input}` is not a phone number")),
        },
    }
}

fn unparseable(message: String) -> CommandResult {
    CommandResult::failure(COMMAND, "unparseable_input", message, UNPARSEABLE_EXIT_CODE)
}
