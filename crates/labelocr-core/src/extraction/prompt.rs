/// System instruction sent with every extraction request: the six schema
/// keys, one worked example, and `null` for anything the text lacks.
pub const SYSTEM_PROMPT: &str = r#"Extract product_name, manufacturer_name, manufacture_date, expiry_date, shelf_life and batch_number from the given text and return them as a single JSON object.

Sample text:
    Amul Taaza Homogenised Toned Milk
    Manufactured & Packed by: Gujarat Co-operative Milk Marketing Federation Ltd., Anand, India
    Batch No: A23M08
    Manufacture Date: 12/09/2025
    Best Before: 7 days from packaging
    Expiry Date: 19/09/2025
    Net Volume: 1L

Output should look like:
{
    "product_name": "Amul Taaza Homogenised Toned Milk",
    "manufacturer_name": "Gujarat Co-operative Milk Marketing Federation Ltd.",
    "manufacture_date": "12-09-2025",
    "expiry_date": "19-09-2025",
    "shelf_life": "7 days from packaging",
    "batch_number": "A23M08"
}

Write dates as DD-MM-YYYY. If some information is missing from the given text, use null as its value."#;
