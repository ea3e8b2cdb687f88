/*!

This is the long-form manual for `applicant_merge` and the `intake` command.

## The applicant schema

Every source is mapped onto the same 17 fields, in this order:

| field                      | normalization              |
|----------------------------|----------------------------|
| `timestamp`                | parsed date-time, kept     |
| `first_names`              | text                       |
| `surname`                  | text                       |
| `id_number`                | identifier (the key)       |
| `contact_number`           | phone                      |
| `alternate_contact_number` | phone                      |
| `email`                    | text                       |
| `street_address`           | text                       |
| `suburb`                   | text                       |
| `city`                     | text                       |
| `province`                 | text                       |
| `postal_code`              | identifier                 |
| `sars_number`              | identifier                 |
| `beneficiary_number`       | identifier                 |
| `banking_institution`      | text                       |
| `bank_account_number`      | text                       |
| `account_type`             | text                       |

* text: trimmed, then each word capitalized (`" van der MERWE "` becomes `"Van Der Merwe"`)
* phone: only the digits are kept, and a leading `+` (`"+27 82 123 4567"` becomes `"+27821234567"`)
* identifier: all the whitespace is removed

Blank values are always stored as missing values, never as empty strings.

## Column labels

The labels of the forms are first reduced to a token: lowercase, whitespace
replaced by underscores, every character other than `a-z`, `0-9` and `_`
removed. `"Identity Number :"` becomes `identity_number` and `"City/Town"`
becomes `citytown`. The token is then looked up in the alias table
(`identity_number` is an alias of `id_number`, `citytown` of `city`, and so
on). Labels that map to nothing in the schema are ignored. When two labels
of the same form map to the same field, the leftmost column is used.

The tax number is always called `sars_number`. `sars_tax_number` is only an
alias.

## Duplicate submissions

Within one form, the rows are sorted by their `timestamp` column (or the
first column whose label is an alias of it, such as `Last Updated`), and only
the last row per unique key is kept, so the most recent submission of an
applicant wins. Keys are compared without their whitespace, so
`800101 5009087` and `8001015009087` are the same applicant. Dates are read day first: `03/04/2024` is the 3rd of April.
Timestamps that cannot be read count as the oldest submissions. A form
without a `timestamp` column keeps the last row in sheet order.

## Merging forms

The forms are merged in the order of the configuration, followed by the
records already registered in the database. For each identity number and each
field, the first value found in that order is kept. An applicant record may
thus mix the fields of several forms. Registered records never override a
value coming from a form, they only fill the gaps.

Rows without an identity number are dropped from the merge.

## Before storing

The merged table is refused if it is empty, if it lacks one of the
`id_number`, `first_names` or `surname` columns, or if no record has a
non-blank identity number.

*/
