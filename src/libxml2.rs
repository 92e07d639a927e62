//! LibXML2 FFI Module
//!
//! Direct libxml2 bindings for document parsing, tree inspection, XPath 1.0
//! evaluation and serialization.
//!
//! Only the leading, ABI-stable fields of the libxml2 tree structures are
//! declared. Every structure is allocated and freed by libxml2; Rust code only
//! reads through pointers it was handed.
//!
//! ## Thread Safety
//!
//! A parsed document may be used by one thread at a time. The structured error
//! handler is thread-local inside libxml2, so [`ErrorCapture`] only collects
//! diagnostics raised on the calling thread.

use std::ffi::CStr;
use std::sync::Once;

use libc::{c_char, c_int, c_ushort, c_void};

/// Global initialization flag for libxml2
///
/// libxml2's initialization functions are NOT thread-safe, so they run
/// exactly once behind `std::sync::Once`.
static LIBXML2_INIT: Once = Once::new();

/// Substitute entity references with their replacement text
pub const XML_PARSE_NOENT: c_int = 1 << 1;
/// Drop ignorable whitespace text nodes
pub const XML_PARSE_NOBLANKS: c_int = 1 << 8;
/// Forbid network access while parsing
pub const XML_PARSE_NONET: c_int = 1 << 11;

/// Options used for every document parse
pub const PARSE_OPTIONS: c_int = XML_PARSE_NOENT | XML_PARSE_NOBLANKS | XML_PARSE_NONET;

// xmlElementType values
pub const XML_ELEMENT_NODE: c_int = 1;
pub const XML_ATTRIBUTE_NODE: c_int = 2;
pub const XML_TEXT_NODE: c_int = 3;
pub const XML_CDATA_SECTION_NODE: c_int = 4;
pub const XML_PI_NODE: c_int = 7;
pub const XML_COMMENT_NODE: c_int = 8;
pub const XML_DOCUMENT_NODE: c_int = 9;
pub const XML_NAMESPACE_DECL: c_int = 18;

// xmlXPathObjectType values
pub const XPATH_NODESET: c_int = 1;
pub const XPATH_BOOLEAN: c_int = 2;
pub const XPATH_NUMBER: c_int = 3;
pub const XPATH_STRING: c_int = 4;
pub const XPATH_XSLT_TREE: c_int = 9;

/// ## Opaque libxml2 structures
#[repr(C)]
pub struct XmlDoc {
    _private: [u8; 0],
}

#[repr(C)]
pub struct XmlXPathContext {
    _private: [u8; 0],
}

#[repr(C)]
pub struct XmlBuffer {
    _private: [u8; 0],
}

/// `struct _xmlNode`. The first nine fields are shared with `xmlDoc` and
/// `xmlAttr`; fields after `doc` are only valid for non-document nodes.
#[repr(C)]
pub struct XmlNode {
    pub _private: *mut c_void,
    pub node_type: c_int,
    pub name: *const c_char,
    pub children: *mut XmlNode,
    pub last: *mut XmlNode,
    pub parent: *mut XmlNode,
    pub next: *mut XmlNode,
    pub prev: *mut XmlNode,
    pub doc: *mut XmlDoc,
    pub ns: *mut XmlNs,
    pub content: *mut c_char,
    pub properties: *mut XmlAttr,
    pub ns_def: *mut XmlNs,
    pub psvi: *mut c_void,
    pub line: c_ushort,
    pub extra: c_ushort,
}

/// `struct _xmlAttr`
#[repr(C)]
pub struct XmlAttr {
    pub _private: *mut c_void,
    pub node_type: c_int,
    pub name: *const c_char,
    pub children: *mut XmlNode,
    pub last: *mut XmlNode,
    pub parent: *mut XmlNode,
    pub next: *mut XmlAttr,
    pub prev: *mut XmlAttr,
    pub doc: *mut XmlDoc,
    pub ns: *mut XmlNs,
}

/// `struct _xmlNs`
#[repr(C)]
pub struct XmlNs {
    pub next: *mut XmlNs,
    pub ns_type: c_int,
    pub href: *const c_char,
    pub prefix: *const c_char,
    pub _private: *mut c_void,
    pub context: *mut XmlDoc,
}

/// `struct _xmlNodeSet`
#[repr(C)]
pub struct XmlNodeSet {
    pub node_nr: c_int,
    pub node_max: c_int,
    pub node_tab: *mut *mut XmlNode,
}

/// `struct _xmlXPathObject`
#[repr(C)]
pub struct XmlXPathObject {
    pub object_type: c_int,
    pub nodesetval: *mut XmlNodeSet,
    pub boolval: c_int,
    pub floatval: f64,
    pub stringval: *mut c_char,
    pub user: *mut c_void,
    pub index: c_int,
    pub user2: *mut c_void,
    pub index2: c_int,
}

#[repr(C)]
pub struct xmlError {
    pub domain: c_int,
    pub code: c_int,
    pub message: *const c_char,
    pub level: c_int,
    pub file: *const c_char,
    pub line: c_int,
    pub str1: *const c_char,
    pub str2: *const c_char,
    pub str3: *const c_char,
    pub int1: c_int,
    pub int2: c_int,
    pub ctxt: *mut c_void,
    pub node: *mut c_void,
}

pub type XmlStructuredErrorFunc =
    Option<unsafe extern "C" fn(user_data: *mut c_void, error: *mut xmlError)>;

// External libxml2 FFI declarations
#[cfg_attr(target_os = "windows", link(name = "libxml2"))]
#[cfg_attr(not(target_os = "windows"), link(name = "xml2"))]
unsafe extern "C" {
    pub fn xmlInitParser();
    pub fn xmlInitGlobals();

    pub fn xmlSetStructuredErrorFunc(ctx: *mut c_void, handler: XmlStructuredErrorFunc);

    // Document parsing
    pub fn xmlReadMemory(
        buffer: *const c_char,
        size: c_int,
        url: *const c_char,
        encoding: *const c_char,
        options: c_int,
    ) -> *mut XmlDoc;
    pub fn xmlFreeDoc(doc: *mut XmlDoc);
    pub fn xmlDocGetRootElement(doc: *const XmlDoc) -> *mut XmlNode;

    // XPath
    pub fn xmlXPathNewContext(doc: *mut XmlDoc) -> *mut XmlXPathContext;
    pub fn xmlXPathFreeContext(ctxt: *mut XmlXPathContext);
    pub fn xmlXPathRegisterNs(
        ctxt: *mut XmlXPathContext,
        prefix: *const c_char,
        ns_uri: *const c_char,
    ) -> c_int;
    pub fn xmlXPathNodeEval(
        node: *mut XmlNode,
        expr: *const c_char,
        ctxt: *mut XmlXPathContext,
    ) -> *mut XmlXPathObject;
    pub fn xmlXPathFreeObject(obj: *mut XmlXPathObject);

    // Serialization
    pub fn xmlBufferCreate() -> *mut XmlBuffer;
    pub fn xmlBufferFree(buf: *mut XmlBuffer);
    pub fn xmlBufferContent(buf: *const XmlBuffer) -> *const c_char;
    pub fn xmlNodeDump(
        buf: *mut XmlBuffer,
        doc: *mut XmlDoc,
        cur: *mut XmlNode,
        level: c_int,
        format: c_int,
    ) -> c_int;
    pub fn xmlSaveFormatFileEnc(
        filename: *const c_char,
        cur: *mut XmlDoc,
        encoding: *const c_char,
        format: c_int,
    ) -> c_int;
}

/// Initialize the libxml2 parser exactly once, in a thread-safe manner
pub fn ensure_initialized() {
    LIBXML2_INIT.call_once(|| unsafe {
        xmlInitParser();
        xmlInitGlobals();
    });
}

/// Callback for libxml2 to report errors (structured)
unsafe extern "C" fn structured_error_callback(user_data: *mut c_void, error: *mut xmlError) {
    let errors = unsafe { &mut *(user_data as *mut Vec<String>) };

    if !error.is_null() {
        let msg_ptr = unsafe { (*error).message };
        let line = unsafe { (*error).line };
        if let Some(message) = unsafe { c_string(msg_ptr) } {
            let message = message.trim();
            if line > 0 {
                errors.push(format!("line {}: {}", line, message));
            } else {
                errors.push(message.to_string());
            }
        }
    }
}

/// Collects libxml2 diagnostics raised on this thread while alive
///
/// Installs the structured error handler on creation and removes it on drop,
/// so libxml2 never writes to stderr behind the caller's back.
pub struct ErrorCapture {
    errors: *mut Vec<String>,
}

impl ErrorCapture {
    pub fn new() -> Self {
        ensure_initialized();
        let errors = Box::into_raw(Box::new(Vec::new()));
        unsafe {
            xmlSetStructuredErrorFunc(errors as *mut c_void, Some(structured_error_callback));
        }
        Self { errors }
    }

    /// Messages captured so far, joined for error reporting
    pub fn details(&self, fallback: &str) -> String {
        let errors = unsafe { &*self.errors };
        if errors.is_empty() {
            fallback.to_string()
        } else {
            errors.join("; ")
        }
    }
}

impl Default for ErrorCapture {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ErrorCapture {
    fn drop(&mut self) {
        // Safety: the handler is removed before the buffer it writes into is freed.
        unsafe {
            xmlSetStructuredErrorFunc(std::ptr::null_mut(), None);
            drop(Box::from_raw(self.errors));
        }
    }
}

/// Copy a libxml2 string into an owned `String`
///
/// # Safety
///
/// `ptr` must be null or point to a NUL-terminated string that stays valid
/// for the duration of the call.
pub unsafe fn c_string(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        None
    } else {
        Some(unsafe { CStr::from_ptr(ptr) }.to_string_lossy().into_owned())
    }
}

/// RAII guard around an `xmlBuffer`
pub struct BufferGuard(*mut XmlBuffer);

impl BufferGuard {
    pub fn new() -> Option<Self> {
        let ptr = unsafe { xmlBufferCreate() };
        if ptr.is_null() { None } else { Some(Self(ptr)) }
    }

    pub fn as_ptr(&self) -> *mut XmlBuffer {
        self.0
    }

    pub fn contents(&self) -> String {
        unsafe { c_string(xmlBufferContent(self.0)) }.unwrap_or_default()
    }
}

impl Drop for BufferGuard {
    fn drop(&mut self) {
        unsafe { xmlBufferFree(self.0) }
    }
}

/// RAII guard around an `xmlXPathContext`
pub struct XPathContextGuard(*mut XmlXPathContext);

impl XPathContextGuard {
    pub fn new(doc: *mut XmlDoc) -> Option<Self> {
        let ptr = unsafe { xmlXPathNewContext(doc) };
        if ptr.is_null() { None } else { Some(Self(ptr)) }
    }

    pub fn as_ptr(&self) -> *mut XmlXPathContext {
        self.0
    }
}

impl Drop for XPathContextGuard {
    fn drop(&mut self) {
        unsafe { xmlXPathFreeContext(self.0) }
    }
}

/// RAII guard around an `xmlXPathObject`
pub struct XPathObjectGuard(*mut XmlXPathObject);

impl XPathObjectGuard {
    /// Takes ownership of a non-null result object
    pub fn from_raw(ptr: *mut XmlXPathObject) -> Option<Self> {
        if ptr.is_null() { None } else { Some(Self(ptr)) }
    }

    pub fn get(&self) -> &XmlXPathObject {
        unsafe { &*self.0 }
    }
}

impl Drop for XPathObjectGuard {
    fn drop(&mut self) {
        unsafe { xmlXPathFreeObject(self.0) }
    }
}
