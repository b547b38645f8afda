use std::sync::Arc;
use studybuddy_core::{ChunkingConfig, Document, Granularity};
use studybuddy_vector::{reconstruct, DocumentSplitter, RegexTokenEncoder, TokenEncoder};

// Roughly three pages of lecture notes
fn lecture_notes() -> String {
    let paragraph = "Cellular respiration breaks down glucose to release energy. \
        Glycolysis happens in the cytoplasm and yields two molecules of pyruvate, \
        while the Krebs cycle and the electron transport chain take place in the \
        mitochondria. Oxygen is the final electron acceptor; without it, cells fall \
        back on fermentation, producing lactate or ethanol (depending on the organism).\n\n";
    paragraph.repeat(24)
}

fn encoder() -> Arc<dyn TokenEncoder> {
    Arc::new(RegexTokenEncoder::new().unwrap())
}

fn splitter(coarse: ChunkingConfig, fine: ChunkingConfig) -> DocumentSplitter {
    DocumentSplitter::new(encoder(), coarse, fine)
}

#[test]
fn test_splitting_is_deterministic() {
    let doc = Document::new("notes.txt", lecture_notes());
    let s = splitter(ChunkingConfig::new(300, 40), ChunkingConfig::new(80, 10));

    let first = s.split(&doc).unwrap();
    let second = s.split(&doc).unwrap();

    let bounds = |chunks: &[studybuddy_core::Chunk]| -> Vec<(usize, usize)> {
        chunks.iter().map(|c| (c.start, c.end)).collect()
    };
    assert_eq!(bounds(&first.coarse), bounds(&second.coarse));
    assert_eq!(bounds(&first.fine), bounds(&second.fine));
    assert_eq!(first.fine, second.fine);
}

#[test]
fn test_fine_chunks_reconstruct_document() {
    let text = lecture_notes();
    let doc = Document::new("notes.txt", text.clone());

    for (size, overlap) in [(80, 10), (50, 49), (1000, 100), (7, 0)] {
        let split = splitter(ChunkingConfig::new(10000, 200), ChunkingConfig::new(size, overlap))
            .split(&doc)
            .unwrap();
        assert_eq!(reconstruct(&split.fine), text, "size {} overlap {}", size, overlap);
        assert_eq!(reconstruct(&split.coarse), text);
    }
}

#[test]
fn test_token_counts_respect_ceiling() {
    let doc = Document::new("notes.txt", lecture_notes());
    let fine = ChunkingConfig::new(64, 8);
    let split = splitter(ChunkingConfig::new(256, 32), fine).split(&doc).unwrap();

    let enc = encoder();
    for chunk in split.fine.iter().chain(split.coarse.iter()) {
        let max = match chunk.granularity {
            Granularity::Fine => 64,
            Granularity::Coarse => 256,
        };
        assert!(chunk.token_count <= max);
        assert_eq!(enc.count_tokens(&chunk.text).unwrap(), chunk.token_count);
    }

    // all but the final chunk are full windows
    let (last, rest) = split.fine.split_last().unwrap();
    assert!(rest.iter().all(|c| c.token_count == 64));
    assert!(last.token_count <= 64);
}

#[test]
fn test_chunk_indices_are_sequential_and_overlapping() {
    let doc = Document::new("notes.txt", lecture_notes());
    let split = splitter(ChunkingConfig::new(300, 40), ChunkingConfig::new(80, 10))
        .split(&doc)
        .unwrap();

    for (i, pair) in split.fine.windows(2).enumerate() {
        assert_eq!(pair[0].index, i);
        assert_eq!(pair[1].index, i + 1);
        assert!(pair[1].start < pair[0].end);
        assert_eq!(pair[0].end - pair[1].start, pair[1].overlap_with_previous);
        assert_eq!(&doc.text[pair[1].start..pair[1].end], pair[1].text);
    }
}

#[test]
fn test_small_document_defaults() {
    let doc = Document::new("notes.txt", lecture_notes());
    let split = splitter(ChunkingConfig::new(10000, 200), ChunkingConfig::new(1000, 100))
        .split(&doc)
        .unwrap();

    assert_eq!(split.coarse.len(), 1);
    assert!(split.fine.len() > 1);
    assert!(split.fine.iter().all(|c| c.granularity == Granularity::Fine));
}
