use failure::Error;
use quick_xml::events::Event;
use quick_xml::Reader;

const FILE_IDENTIFIER_TAG: &[u8] = b"fileIdentifier";

/// Extract the text of the `fileIdentifier` element of a stored metadata document.
pub fn read_file_identifier(document: &str) -> Result<Option<String>, Error> {
    let mut xml_reader = Reader::from_str(document);
    xml_reader.trim_text(true);

    let mut xml_buffer = Vec::new();
    let mut inside_identifier = false;

    loop {
        match xml_reader.read_event(&mut xml_buffer) {
            Ok(Event::Start(ref e)) if e.local_name() == FILE_IDENTIFIER_TAG => {
                inside_identifier = true;
            }
            Ok(Event::End(ref e)) if e.local_name() == FILE_IDENTIFIER_TAG => {
                inside_identifier = false;
            }
            Ok(Event::Text(ref e)) if inside_identifier => {
                let text = e.unescape_and_decode(&xml_reader)?;
                if !text.trim().is_empty() {
                    return Ok(Some(text.trim().to_string()));
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(e.into()),
            _ => (), // ignore all other events
        }

        xml_buffer.clear();
    }

    Ok(None)
}
