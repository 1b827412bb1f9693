use std::io::Write;

use anyhow::Result;
use quick_xml::{
    events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event},
    Writer,
};

pub(crate) trait Document {
    fn declaration(&mut self, version: &str) -> Result<()>;
    fn open(&mut self, name: &str, attributes: &[(&str, &str)]) -> Result<()>;
    fn close(&mut self, name: &str) -> Result<()>;
    fn text_element(&mut self, name: &str, text: &str) -> Result<()>;
    fn empty_element(&mut self, name: &str, attributes: &[(&str, &str)]) -> Result<()>;
}

impl<W: Write> Document for Writer<W> {
    fn declaration(&mut self, version: &str) -> Result<()> {
        self.write_event(Event::Decl(BytesDecl::new(version, None, None)))?;
        Ok(())
    }

    fn open(&mut self, name: &str, attributes: &[(&str, &str)]) -> Result<()> {
        let start = BytesStart::new(name).with_attributes(attributes.iter().copied());
        self.write_event(Event::Start(start))?;
        Ok(())
    }

    fn close(&mut self, name: &str) -> Result<()> {
        self.write_event(Event::End(BytesEnd::new(name)))?;
        Ok(())
    }

    fn text_element(&mut self, name: &str, text: &str) -> Result<()> {
        self.write_event(Event::Start(BytesStart::new(name)))?;
        self.write_event(Event::Text(BytesText::new(text)))?;
        self.write_event(Event::End(BytesEnd::new(name)))?;
        Ok(())
    }

    fn empty_element(&mut self, name: &str, attributes: &[(&str, &str)]) -> Result<()> {
        let element = BytesStart::new(name).with_attributes(attributes.iter().copied());
        self.write_event(Event::Empty(element))?;
        Ok(())
    }
}
