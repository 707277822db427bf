pub mod invoice_numbers;
