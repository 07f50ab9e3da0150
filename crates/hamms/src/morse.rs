//! International morse code for the unparseable content type behavior.

/// Encodes `message` as morse: letters separated by a space, words by ` / `.
///
/// Characters without a morse representation are left out.
pub fn encode(message: &str) -> String {
    message
        .split_whitespace()
        .map(|word| word.chars().filter_map(symbol).collect::<Vec<_>>().join(" "))
        .filter(|word| !word.is_empty())
        .collect::<Vec<_>>()
        .join(" / ")
}

fn symbol(c: char) -> Option<&'static str> {
    let code = match c.to_ascii_uppercase() {
        'A' => ".-",
        'B' => "-...",
        'C' => "-.-.",
        'D' => "-..",
        'E' => ".",
        'F' => "..-.",
        'G' => "--.",
        'H' => "....",
        'I' => "..",
        'J' => ".---",
        'K' => "-.-",
        'L' => ".-..",
        'M' => "--",
        'N' => "-.",
        'O' => "---",
        'P' => ".--.",
        'Q' => "--.-",
        'R' => ".-.",
        'S' => "...",
        'T' => "-",
        'U' => "..-",
        'V' => "...-",
        'W' => ".--",
        'X' => "-..-",
        'Y' => "-.--",
        'Z' => "--..",
        '0' => "-----",
        '1' => ".----",
        '2' => "..---",
        '3' => "...--",
        '4' => "....-",
        '5' => ".....",
        '6' => "-....",
        '7' => "--...",
        '8' => "---..",
        '9' => "----.",
        '.' => ".-.-.-",
        ',' => "--..--",
        '?' => "..--..",
        '\'' => ".----.",
        '!' => "-.-.--",
        '/' => "-..-.",
        '(' => "-.--.",
        ')' => "-.--.-",
        '&' => ".-...",
        ':' => "---...",
        ';' => "-.-.-.",
        '=' => "-...-",
        '+' => ".-.-.",
        '-' => "-....-",
        '"' => ".-..-.",
        '@' => ".--.-.",
        _ => return None,
    };
    Some(code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn words_and_letters() {
        assert_eq!(encode("SOS"), "... --- ...");
        assert_eq!(encode("PLEASE SEND HELP"), ".--. .-.. . .- ... . / ... . -. -.. / .... . .-.. .--.");
    }

    #[test]
    fn case_and_unknown_characters() {
        assert_eq!(encode("hi"), ".... ..");
        assert_eq!(encode("a # b"), ".- / -...");
        assert_eq!(encode(""), "");
    }
}
