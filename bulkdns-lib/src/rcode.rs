//! Human readable names for DNS response codes.

/// Label for a response code, or `""` when the code is not in the table.
pub fn rcode_label(code: u16) -> &'static str {
    match code {
        0 => "Success",
        1 => "Format Error",
        2 => "Server Failure",
        3 => "Name Error",
        4 => "Not Implemented",
        5 => "Refused",
        6 => "YXDomain",
        7 => "YXRrset",
        8 => "NXRrset",
        9 => "Not Auth",
        10 => "Not Zone",
        16 => "Bad Signature / Bad Version",
        17 => "Bad Key",
        18 => "Bad Time",
        19 => "Bad Mode",
        20 => "Bad Name",
        21 => "Bad Algorithm",
        22 => "Bad Trunc",
        23 => "Bad Cookie",
        _ => "",
    }
}
