use super::*;

#[test]
fn empty_input_yields_no_chunks() {
    let chunks = chunk_text("", 512, 50).expect("valid parameters");
    assert!(chunks.is_empty());
}

#[test]
fn whitespace_only_input_yields_no_chunks() {
    let chunks = chunk_text("   \n\t  ", 4, 1).expect("valid parameters");
    assert!(chunks.is_empty());
}

#[test]
fn short_text_is_a_single_chunk() {
    let chunks = chunk_text("Article 17 covers erasure.", 512, 50).expect("valid parameters");
    assert_eq!(chunks, vec!["Article 17 covers erasure.".to_string()]);
}

#[test]
fn windows_start_at_multiples_of_the_step() {
    let text = "x".repeat(1000);
    let chunks = chunk_text(&text, 512, 50).expect("valid parameters");

    // Starts at 0, 462 and 924
    assert_eq!(chunks.len(), 3);
    assert_eq!(chunks[0].chars().count(), 512);
    assert_eq!(chunks[1].chars().count(), 512);
    assert_eq!(chunks[2].chars().count(), 76);
}

#[test]
fn consecutive_windows_share_the_overlap() {
    let text = ('a'..='z').collect::<String>();
    let chunks = chunk_text(&text, 10, 3).expect("valid parameters");

    assert_eq!(chunks[0], "abcdefghij");
    assert_eq!(chunks[1], "hijklmnopq");
    assert_eq!(chunks[2], "opqrstuvwx");
    assert_eq!(chunks[3], "vwxyz");
    assert_eq!(chunks.len(), 4);
}

#[test]
fn every_character_is_covered() {
    let text = "The controller shall erase personal data without undue delay. ".repeat(20);
    let chunks = chunk_text(&text, 100, 20).expect("valid parameters");

    let mut rebuilt = chunks[0].clone();
    for chunk in &chunks[1..] {
        rebuilt.extend(chunk.chars().skip(20));
    }
    assert_eq!(rebuilt, text);
}

#[test]
fn windows_are_counted_in_characters() {
    let text = "émoji🙂ñ".repeat(10);
    let chunks = chunk_text(&text, 7, 2).expect("multibyte text is split on char boundaries");

    assert!(chunks.iter().all(|chunk| chunk.chars().count() <= 7));
    assert_eq!(chunks[0], "émoji🙂ñ");
}

#[test]
fn raw_window_is_emitted_untrimmed() {
    let chunks = chunk_text("  padded  ", 512, 0).expect("valid parameters");
    assert_eq!(chunks, vec!["  padded  ".to_string()]);
}

#[test]
fn blank_windows_are_skipped() {
    let text = format!("{}{}", "a".repeat(5), " ".repeat(10));
    let chunks = chunk_text(&text, 5, 0).expect("valid parameters");
    assert_eq!(chunks, vec!["aaaaa".to_string()]);
}

#[test]
fn invalid_parameters_are_rejected() {
    assert!(matches!(
        chunk_text("text", 0, 0),
        Err(ConfigError::InvalidChunkSize(0))
    ));
    assert!(matches!(
        chunk_text("text", 10, 10),
        Err(ConfigError::InvalidChunkOverlap(10, 10))
    ));
    assert!(matches!(
        chunk_text("text", 10, 12),
        Err(ConfigError::InvalidChunkOverlap(12, 10))
    ));
}

#[test]
fn config_chunk_uses_configured_sizes() {
    let config = ChunkingConfig::new(4, 1).expect("valid config");
    let chunks = config.chunk("abcdefg").expect("valid parameters");
    assert_eq!(chunks, vec!["abcd", "defg", "g"]);
}

#[test]
fn config_constructor_validates() {
    assert!(ChunkingConfig::new(512, 50).is_ok());
    assert!(ChunkingConfig::new(0, 0).is_err());
    assert!(ChunkingConfig::new(50, 50).is_err());
}
