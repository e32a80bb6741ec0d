//! Fixed instruction payload sent with every label image.

pub const LABEL_SYSTEM_PROMPT: &str = "\
You read shipping labels and answer as a JSON API. \
Output a single JSON object and nothing else.";

pub const LABEL_EXTRACTION_PROMPT: &str = "\
Read the shipping label in this image and extract two values:\n\
1. `tracking_number`: the parcel tracking number. It usually starts with 'CON', '1Z', '5904' or 'DOM'.\n\
2. `phone_number`: the phone number printed in the recipient block (the 'TO:' address). \
Never use the sender's phone number.\n\n\
Reply with one valid JSON object containing exactly these two keys. \
Use the string 'NONE' for any value you cannot find. \
Do not write anything before or after the JSON object.\n\
Example: {\"tracking_number\": \"CON123456789012345678\", \"phone_number\": \"(555) 123-4567\"}";
