use folio::{BookCatalog, BookInfo, Location, StructureType, StructuredReference};

struct Canon(Vec<BookInfo>);

impl BookCatalog for Canon {
    fn book(&self, slug: &str) -> Option<BookInfo> {
        self.0.iter().find(|b| b.slug == slug).cloned()
    }
}

fn main() {
    let canon = Canon(vec![
        BookInfo::new("Song of Songs", StructureType::Verse, 2),
        BookInfo::new("Berakhot", StructureType::DafLine, 2),
        BookInfo::new("Introduction", StructureType::SectionOnly, 1),
    ]);

    for raw in [
        "Song of Songs.1.2",
        "Berakhot.2b.7",
        "Berakhot.2",
        "Introduction.4",
        "Song_of_Songs.1",
        "Song_of_Songs.one.2",
        "Exodus.1.1",
    ] {
        match Location::parse(raw, &canon) {
            Ok(Location::Segment(r)) => {
                println!("{raw:>22} -> segment {r} ordinals={:?} page={}", r.ordinals(), r.section_prefix());
            }
            Ok(Location::Section(c)) => println!("{raw:>22} -> section {c}"),
            Err(err) => println!("{raw:>22} -> error: {err}"),
        }
    }

    let r = StructuredReference::parse("Berakhot.2b.7", &canon).expect("valid reference");
    let again = StructuredReference::parse(&r.serialize(), &canon).expect("round trip");
    assert_eq!(r, again);
}
