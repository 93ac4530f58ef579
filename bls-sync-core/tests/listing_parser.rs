mod common;

use bls_sync_core::error::ParseError;
use bls_sync_core::listing::parse_listing;
use chrono::{TimeZone, Utc};
use common::{iis_listing, BASE_URL};

#[test]
fn test_parse_iis_listing_reads_sizes_and_dates() {
    let html = iis_listing(&[("pr.class", 12345), ("pr.data.0.Current", 14521307)]);

    let listing = parse_listing(&html, BASE_URL).expect("listing should parse");

    assert_eq!(listing.entries.len(), 2, "directory and parent links are excluded");
    let class = &listing.entries[0];
    assert_eq!(class.filename, "pr.class");
    assert_eq!(class.url, format!("{BASE_URL}pr.class"));
    assert_eq!(class.size, Some(12345));
    assert_eq!(
        class.last_modified,
        Some(Utc.with_ymd_and_hms(2024, 1, 3, 8, 30, 0).unwrap())
    );
    assert_eq!(listing.entries[1].filename, "pr.data.0.Current");
    assert_eq!(listing.entries[1].size, Some(14521307));
    assert_eq!(listing.links_seen, 4);
}

#[test]
fn test_parse_keeps_one_file_among_navigation_links() {
    let html = r#"<ul>
        <li><a href="../">Parent Directory</a></li>
        <li><a href="subdir/">subdir/</a></li>
        <li><a href="pr.series">pr.series</a></li>
    </ul>"#;

    let listing = parse_listing(html, BASE_URL).expect("listing should parse");

    assert_eq!(listing.entries.len(), 1);
    assert_eq!(listing.entries[0].filename, "pr.series");
    assert_eq!(listing.entries[0].size, None, "missing size column stays absent");
    assert_eq!(listing.entries[0].last_modified, None, "missing date column stays absent");
}

#[test]
fn test_parse_apache_listing_reads_trailing_columns() {
    let html = "<pre><img src=\"/icons/blank.gif\" alt=\"Icon \"> <a href=\"?C=N;O=D\">Name</a>                    <a href=\"?C=M;O=A\">Last modified</a>      <a href=\"?C=S;O=A\">Size</a>\n\
<hr><img src=\"/icons/back.gif\" alt=\"[PARENTDIR]\"> <a href=\"/pub/time.series/\">Parent Directory</a>                             -   \n\
<img src=\"/icons/text.gif\" alt=\"[TXT]\"> <a href=\"a.txt\">a.txt</a>                 03-Jan-2024 08:30  100   \n\
<img src=\"/icons/text.gif\" alt=\"[TXT]\"> <a href=\"b.txt\">b.txt</a>                 2024-01-04 09:15   12K  \n\
<hr></pre>";

    let listing = parse_listing(html, BASE_URL).expect("listing should parse");

    assert_eq!(listing.entries.len(), 2);
    let a = &listing.entries[0];
    assert_eq!(a.filename, "a.txt");
    assert_eq!(a.size, Some(100));
    assert_eq!(
        a.last_modified,
        Some(Utc.with_ymd_and_hms(2024, 1, 3, 8, 30, 0).unwrap())
    );
    let b = &listing.entries[1];
    assert_eq!(b.size, None, "abbreviated sizes are not exact byte counts");
    assert_eq!(
        b.last_modified,
        Some(Utc.with_ymd_and_hms(2024, 1, 4, 9, 15, 0).unwrap())
    );
}

#[test]
fn test_parse_error_page_is_parse_error() {
    let html = "<html><body><h1>403 Forbidden</h1><p>Access Denied</p></body></html>";

    let err = parse_listing(html, BASE_URL).expect_err("no links must be an error");

    assert!(matches!(err, ParseError::NoLinks { .. }), "got {err:?}");
}

#[test]
fn test_parse_listing_with_only_navigation_is_empty_not_error() {
    let html = r#"<pre><A HREF="/pub/time.series/">[To Parent Directory]</A><br></pre>"#;

    let listing = parse_listing(html, BASE_URL).expect("navigation-only listing is valid");

    assert!(listing.is_empty());
    assert_eq!(listing.links_seen, 1);
}

#[test]
fn test_parse_duplicate_filename_keeps_last_occurrence() {
    let html = r#"<pre>
 1/3/2024  8:30 AM          100 <A HREF="pr.class">pr.class</A><br>
 1/5/2024  9:00 AM          250 <A HREF="pr.class">pr.class</A><br>
</pre>"#;

    let listing = parse_listing(html, BASE_URL).expect("listing should parse");

    assert_eq!(listing.entries.len(), 1);
    assert_eq!(listing.entries[0].size, Some(250));
}

#[test]
fn test_parse_handles_absolute_and_foreign_links() {
    let html = r#"
        <a href="https://download.example.gov/pub/time.series/pr/pr.footnote">pr.footnote</a>
        <a href="https://elsewhere.example.com/pub/time.series/pr/evil.txt">evil.txt</a>
        <a href="/pub/time.series/ap/ap.series">ap.series</a>
        <a href="mailto:data@example.gov">contact</a>
        <a href='pr.measure'>pr.measure</a>
    "#;

    let listing = parse_listing(html, BASE_URL).expect("listing should parse");

    let names: Vec<&str> = listing.entries.iter().map(|e| e.filename.as_str()).collect();
    assert_eq!(names, vec!["pr.footnote", "pr.measure"]);
}

#[test]
fn test_parse_unclosed_anchor_does_not_swallow_next_row() {
    let html = "<pre><A HREF=\"/pub/time.series/\">[To Parent Directory]</A><br><br>\
         1/3/2024  8:30 AM          100 <A HREF=\"/pub/time.series/pr/a.txt\">a.txt<br>\
         1/4/2024  9:15 AM          200 <A HREF=\"/pub/time.series/pr/b.txt\">b.txt</A><br></pre>";

    let listing = parse_listing(html, BASE_URL).expect("listing should parse");

    let names: Vec<&str> = listing.entries.iter().map(|e| e.filename.as_str()).collect();
    assert_eq!(names, vec!["a.txt", "b.txt"]);
    assert_eq!(listing.entries[0].size, Some(100));
    assert_eq!(listing.entries[1].size, Some(200));
    assert_eq!(
        listing.entries[1].last_modified,
        Some(Utc.with_ymd_and_hms(2024, 1, 4, 9, 15, 0).unwrap())
    );
}
