use folio::{LayoutMode, StructureType};
use folio_reader::{Completion, MemoryCorpus, Reader, ReaderOptions};

fn main() {
    // Example: a host driving the reader with a blocking store.
    //
    // The loop a UI would run:
    // 1) report viewport size / scroll offset, collect the fetch tickets the reader hands out
    // 2) load each ticket (here synchronously via `run`) and feed the result back
    // 3) render `for_each_visible_segment`
    let mut corpus = MemoryCorpus::new()
        .with_book("Genesis", StructureType::Verse, 2)
        .with_book("Exodus", StructureType::Verse, 2);
    for chapter in 1..=3 {
        for verse in 1..=25 {
            let text = "And God said ".repeat(1 + (chapter * verse) % 6);
            corpus
                .insert(&format!("Genesis.{chapter}.{verse}"), &text, None)
                .expect("Genesis is in the catalog");
        }
    }
    for verse in 1..=25 {
        corpus
            .insert(&format!("Exodus.1.{verse}"), "Now these are the names", None)
            .expect("Exodus is in the catalog");
    }

    let options = ReaderOptions::default()
        .on_visible_ref_changed(|r| println!("  reading {r}"))
        .on_boundary_reached(|edge| println!("  corpus boundary: {edge:?}"));
    let mut reader = Reader::new(&corpus, options);
    reader.on_viewport_size(800);

    let seed = reader.open("Genesis.2.5").expect("valid reference");
    println!("seed {:?}", reader.run(seed));

    let mut offset = reader.list().scroll_offset();
    for step in 0..40 {
        offset += 240;
        for ticket in reader.on_scroll(offset) {
            let cursor = ticket.cursor().prefix();
            match reader.run(ticket) {
                Completion::Prepended { segments } => {
                    println!("step {step}: prepended {cursor} ({segments} segments)");
                }
                Completion::Appended { segments } => {
                    println!("step {step}: appended {cursor} ({segments} segments)");
                }
                other => println!("step {step}: {cursor} -> {other:?}"),
            }
        }
        offset = reader.list().scroll_offset();
    }

    let settings = reader.settings().with_layout_mode(LayoutMode::DualColumn);
    reader.apply_settings(settings);
    println!(
        "dual column: total={} offset={} still reading {:?}",
        reader.list().total_size(),
        reader.list().scroll_offset(),
        reader.visible_reference().map(|r| r.serialize()),
    );

    reader.for_each_visible_segment(|item, segment| {
        println!("  [{:>4}] {:>6}px {}", item.index, item.size, segment.id);
    });
}
