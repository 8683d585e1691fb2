//! Structural transforms for hon-xml.
//!
//! Rendered chapter markup is read with a tolerant HTML parser into a
//! [`Document`], then rewritten by an XSLT 1.0 [`Stylesheet`] into the
//! chapter's XML form.
//!
//! ```
//! use hon_xml_xslt::{Parameters, Stylesheet, Value, parse_html};
//!
//! let stylesheet = Stylesheet::parse(
//!   r#"<xsl:stylesheet version="1.0"
//!        xmlns:xsl="http://www.w3.org/1999/XSL/Transform">
//!     <xsl:output omit-xml-declaration="yes"/>
//!     <xsl:param name="suffix"/>
//!     <xsl:template match="/">
//!       <title><xsl:value-of select="//h1"/><xsl:value-of select="$suffix"/></title>
//!     </xsl:template>
//!   </xsl:stylesheet>"#,
//! )?;
//! let doc = parse_html("<h1>Intro</h1><p>unclosed");
//! let params = Parameters::new().with("suffix", Value::String("!".into()));
//! let output = stylesheet.transform(&doc, &params)?;
//! assert_eq!(output.to_string(), "<title>Intro!</title>\n");
//! # Ok::<(), hon_xml_xslt::XsltError>(())
//! ```
pub mod document;
pub mod error;
pub mod number;
pub mod output;
pub mod parse;
pub mod pattern;
pub mod stylesheet;
pub mod transform;
pub mod xml;
pub mod xpath;

pub use document::{Document, DocumentBuilder, NodeId, NodeKind};
pub use error::{Result, XsltError};
pub use output::{OutputMethod, OutputSettings, ResultNode, TransformOutput};
pub use parse::{ParseOptions, parse_html, parse_html_with};
pub use stylesheet::{Stylesheet, XSLT_NAMESPACE};
pub use transform::Parameters;
pub use xpath::Value;
