//! Interactive terminal prompts.

use std::io::{self, BufRead, Write};

fn read_line<R: BufRead>(input: &mut R) -> io::Result<String> {
    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "input closed while waiting for an answer",
        ));
    }
    Ok(line.trim().to_string())
}

/// Ask a yes/no question. An empty answer means yes; anything unrecognized asks again.
pub fn query_yes_no<R: BufRead, W: Write>(
    input: &mut R,
    output: &mut W,
    question: &str,
) -> io::Result<bool> {
    loop {
        write!(output, "{question} [Y/n] ")?;
        output.flush()?;

        match read_line(input)?.to_lowercase().as_str() {
            "" | "y" | "ye" | "yes" => return Ok(true),
            "n" | "no" => return Ok(false),
            _ => writeln!(output, "Please respond with 'yes' or 'no' (or 'y' or 'n').")?,
        }
    }
}

/// Ask for a non-empty value.
pub fn read_value<R: BufRead, W: Write>(
    input: &mut R,
    output: &mut W,
    prompt: &str,
) -> io::Result<String> {
    loop {
        write!(output, "{prompt}")?;
        output.flush()?;

        let value = read_line(input)?;
        if !value.is_empty() {
            return Ok(value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_yes_no_answers() {
        let mut output = Vec::new();
        for (answer, expected) in [("\n", true), ("Yes\n", true), ("y\n", true), ("NO\n", false)] {
            let mut input = Cursor::new(answer);
            assert_eq!(
                query_yes_no(&mut input, &mut output, "Continue?").unwrap(),
                expected,
                "answer {answer:?}"
            );
        }
    }

    #[test]
    fn test_yes_no_asks_again() {
        let mut input = Cursor::new("maybe\nn\n");
        let mut output = Vec::new();

        assert!(!query_yes_no(&mut input, &mut output, "Continue?").unwrap());
        let shown = String::from_utf8(output).unwrap();
        assert_eq!(shown.matches("Continue? [Y/n]").count(), 2);
        assert!(shown.contains("Please respond with 'yes' or 'no'"));
    }

    #[test]
    fn test_read_value_skips_blank_lines() {
        let mut input = Cursor::new("\n  \n  abc123 \n");
        let mut output = Vec::new();
        assert_eq!(read_value(&mut input, &mut output, "PIN: ").unwrap(), "abc123");
    }

    #[test]
    fn test_closed_input() {
        let mut output = Vec::new();
        let err = read_value(&mut Cursor::new(""), &mut output, "PIN: ").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
        assert!(query_yes_no(&mut Cursor::new(""), &mut output, "Continue?").is_err());
    }
}
